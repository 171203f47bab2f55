use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use lostfound::config::{has_flag, Config};

const USAGE: &str = "lostfound server\n\nUSAGE:\n  lostfound [--http-port N] [--data-dir PATH]\n\nOPTIONS:\n  --http-port N     HTTP port (env: LOSTFOUND_HTTP_PORT, default 5000)\n  --data-dir PATH   Folder for users.json, items.json and uploads/ (env: LOSTFOUND_DATA_DIR, default data)\n\nENVIRONMENT:\n  LOSTFOUND_UPLOADS_DIR, LOSTFOUND_JWT_SECRET, LOSTFOUND_TOKEN_TTL_SECS, LOSTFOUND_MAX_UPLOAD_BYTES\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config = Config::load(&args)?;
    info!(
        target: "startup",
        "lostfound starting: RUST_LOG='{}', http_port={}, data_dir='{}', uploads_dir='{}'",
        rust_log, config.http_port, config.data_dir.display(), config.uploads_dir.display()
    );

    lostfound::server::run(config).await
}
