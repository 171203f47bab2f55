use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::token::TokenSigner;
use crate::error::{AppError, AppResult};
use crate::model::{PublicUser, Role, User};
use crate::security::{self, MIN_PASSWORD_LEN};
use crate::storage::UserRepository;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

/// What `ensure_admin` did to the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    Created(User),
    Promoted(User),
    AlreadyAdmin(User),
}

pub trait AuthProvider: Send + Sync {
    fn signup(&self, req: &SignupRequest) -> AppResult<LoginResponse>;
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
}

/// Accounts held in the user repository, passwords hashed with argon2.
pub struct LocalAuthProvider {
    users: Arc<dyn UserRepository>,
    signer: Arc<TokenSigner>,
}

impl LocalAuthProvider {
    pub fn new(users: Arc<dyn UserRepository>, signer: Arc<TokenSigner>) -> Self { Self { users, signer } }

    /// Create an admin account, or promote an existing one and reset its
    /// password and name. The HTTP API never changes roles; only this does.
    pub fn ensure_admin(&self, email: &str, password: &str, name: &str) -> AppResult<AdminOutcome> {
        validate_credentials(email, password)?;
        if let Some(existing) = self.users.find_by_email(email)? {
            if existing.role == Role::Admin {
                return Ok(AdminOutcome::AlreadyAdmin(existing));
            }
            let hash = security::hash_password(password)?;
            let name = name.trim().to_string();
            let promoted = self.users.update(existing.id, &|u| {
                u.role = Role::Admin;
                u.password_hash = hash.clone();
                u.name = name.clone();
            })?;
            info!(target: "lostfound::identity", "promoted user={} to admin", promoted.id);
            return Ok(AdminOutcome::Promoted(promoted));
        }
        let hash = security::hash_password(password)?;
        let created = self.users.insert(name, email, &hash, Role::Admin)?;
        info!(target: "lostfound::identity", "created admin user={}", created.id);
        Ok(AdminOutcome::Created(created))
    }

    fn respond(&self, user: &User) -> AppResult<LoginResponse> {
        Ok(LoginResponse { token: self.signer.issue(user)?, user: user.public() })
    }
}

fn validate_credentials(email: &str, password: &str) -> AppResult<()> {
    if !security::is_valid_email(email) {
        return Err(AppError::validation("invalid_email", "A valid email address is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("weak_password".to_string(), format!("Password must be at least {MIN_PASSWORD_LEN} characters")));
    }
    Ok(())
}

impl AuthProvider for LocalAuthProvider {
    fn signup(&self, req: &SignupRequest) -> AppResult<LoginResponse> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("name_required", "Name is required"));
        }
        validate_credentials(&req.email, &req.password)?;
        if self.users.find_by_email(&req.email)?.is_some() {
            return Err(AppError::conflict("email_taken", "User already exists"));
        }
        let hash = security::hash_password(&req.password)?;
        // Signup always yields a plain user; admins come from `ensure_admin`.
        let user = self.users.insert(&req.name, &req.email, &hash, Role::User)?;
        info!(target: "lostfound::identity", "auth.signup user={}", user.id);
        self.respond(&user)
    }

    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let invalid = || AppError::unauthenticated("invalid_credentials", "Invalid email or password");
        let Some(user) = self.users.find_by_email(&req.email)? else { return Err(invalid()); };
        if !security::verify_password(&user.password_hash, &req.password) {
            return Err(invalid());
        }
        info!(target: "lostfound::identity", "auth.login user={} role={}", user.id, user.role);
        self.respond(&user)
    }
}
