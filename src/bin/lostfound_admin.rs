//!
//! lostfound admin tool
//! --------------------
//! Creates an administrator account, or promotes an existing account to admin
//! and resets its password and display name. This is the only way an account
//! gets the admin role. Refuses to run while a server holds the data directory.

use std::sync::Arc;

use anyhow::{Context, Result};
use lostfound::config::{has_flag, Config};
use lostfound::identity::{AdminOutcome, LocalAuthProvider, TokenSigner};
use lostfound::storage::Stores;

const DEFAULT_EMAIL: &str = "admin@example.com";
const DEFAULT_PASSWORD: &str = "admin123";
const DEFAULT_NAME: &str = "Admin User";

/// Positional arguments, skipping flags and their values.
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 1;
    while i < args.len() {
        if args[i] == "--data-dir" {
            i += 2;
            continue;
        }
        if !args[i].starts_with("--") {
            out.push(args[i].clone());
        }
        i += 1;
    }
    out
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("lostfound admin\n\nUSAGE:\n  lostfound_admin [EMAIL] [PASSWORD] [NAME] [--data-dir PATH]\n\nDefaults: {DEFAULT_EMAIL} / {DEFAULT_PASSWORD} / \"{DEFAULT_NAME}\".\nAn existing account with EMAIL is promoted and its password and name are reset.\nThe server must be stopped first; the data directory is locked while it runs.\n");
        return Ok(());
    }

    let config = Config::load(&args)?;
    let data_dir = config.data_dir.clone();
    let pos = positional(&args);
    let email = pos.first().map(String::as_str).unwrap_or(DEFAULT_EMAIL);
    let password = pos.get(1).map(String::as_str).unwrap_or(DEFAULT_PASSWORD);
    let name = pos.get(2).map(String::as_str).unwrap_or(DEFAULT_NAME);

    let stores = Stores::open(&data_dir).with_context(|| format!("While opening stores under {}", data_dir.display()))?;
    let signer = Arc::new(TokenSigner::new(&config.jwt_secret, config.token_ttl));
    let provider = LocalAuthProvider::new(stores.users.clone(), signer);

    match provider.ensure_admin(email, password, name)? {
        AdminOutcome::Created(user) => println!("Admin user created: {} ({})", user.email, user.id),
        AdminOutcome::Promoted(user) => println!("Existing user promoted to admin: {} ({})", user.email, user.id),
        AdminOutcome::AlreadyAdmin(user) => println!("Admin user already exists: {} ({})", user.email, user.id),
    }
    Ok(())
}
