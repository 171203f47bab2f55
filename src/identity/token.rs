use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::principal::Principal;
use crate::error::{AppError, AppResult};
use crate::model::{Role, User};

/// Signed bearer-token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signer/verifier built once from the process-wide secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    pub ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| AppError::internal("token_ttl".to_string(), format!("token lifetime of {}s is out of range", self.ttl.as_secs())))?;
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now,
            exp,
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::internal("token_encode".to_string(), e.to_string()))
    }

    /// Verify signature and expiry and resolve the caller.
    pub fn authenticate(&self, token: Option<&str>) -> AppResult<Principal> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Err(AppError::unauthenticated("token_missing", "Not authorized, no token"));
        };
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(target: "lostfound::identity", "token rejected: {}", e);
            AppError::unauthenticated("token_invalid", "Not authorized, token failed")
        })?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::unauthenticated("token_invalid", "Not authorized, token failed"))?;
        Ok(Principal::new(user_id, data.claims.role))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, rest) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User { id: Uuid::new_v4(), name: "Ann".into(), email: "ann@x.io".into(), password_hash: String::new(), role, created_at: now, updated_at: now }
    }

    #[test]
    fn issued_token_authenticates_with_role() {
        let signer = TokenSigner::new(b"secret-one", Duration::from_secs(3600));
        let u = user(Role::Admin);
        let token = signer.issue(&u).unwrap();
        let p = signer.authenticate(Some(&token)).unwrap();
        assert_eq!(p.user_id, u.id);
        assert!(p.is_admin());
    }

    #[test]
    fn out_of_range_lifetime_fails_instead_of_wrapping() {
        let signer = TokenSigner::new(b"secret-one", Duration::from_secs(u64::MAX));
        assert_eq!(signer.issue(&user(Role::User)).unwrap_err().code_str(), "token_ttl");
        let signer = TokenSigner::new(b"secret-one", Duration::from_secs(i64::MAX as u64));
        assert_eq!(signer.issue(&user(Role::User)).unwrap_err().code_str(), "token_ttl");
    }

    #[test]
    fn ten_year_lifetime_issues_a_usable_token() {
        let signer = TokenSigner::new(b"secret-one", Duration::from_secs(crate::config::MAX_TOKEN_TTL_SECS));
        let u = user(Role::User);
        let token = signer.issue(&u).unwrap();
        assert_eq!(signer.authenticate(Some(&token)).unwrap().user_id, u.id);
    }

    #[test]
    fn missing_and_garbage_tokens_are_unauthenticated() {
        let signer = TokenSigner::new(b"secret-one", Duration::from_secs(3600));
        assert_eq!(signer.authenticate(None).unwrap_err().code_str(), "token_missing");
        assert_eq!(signer.authenticate(Some("  ")).unwrap_err().code_str(), "token_missing");
        assert_eq!(signer.authenticate(Some("abc.def.ghi")).unwrap_err().http_status(), 401);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let a = TokenSigner::new(b"secret-one", Duration::from_secs(3600));
        let b = TokenSigner::new(b"secret-two", Duration::from_secs(3600));
        let token = a.issue(&user(Role::User)).unwrap();
        assert_eq!(b.authenticate(Some(&token)).unwrap_err().code_str(), "token_invalid");
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new(b"secret-one", Duration::from_secs(3600));
        let now = Utc::now().timestamp();
        let claims = Claims { sub: Uuid::new_v4().to_string(), role: Role::User, iat: now - 7200, exp: now - 3600 };
        let token = signer.encode(&claims).unwrap();
        assert_eq!(signer.authenticate(Some(&token)).unwrap_err().code_str(), "token_invalid");
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let signer = TokenSigner::new(b"secret-one", Duration::from_secs(3600));
        let now = Utc::now().timestamp();
        let claims = Claims { sub: "admin".into(), role: Role::Admin, iat: now, exp: now + 60 };
        let token = signer.encode(&claims).unwrap();
        assert!(signer.authenticate(Some(&token)).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
