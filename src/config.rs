//!
//! Runtime configuration
//! ---------------------
//! Built once at startup from environment variables (optionally seeded from a
//! `.env` file) with CLI flags taking precedence, then handed to constructors.
//!
//! | variable                     | flag          | default               |
//! |------------------------------|---------------|-----------------------|
//! | `LOSTFOUND_HTTP_PORT`        | `--http-port` | 5000                  |
//! | `LOSTFOUND_DATA_DIR`         | `--data-dir`  | `data`                |
//! | `LOSTFOUND_UPLOADS_DIR`      |               | `<data dir>/uploads`  |
//! | `LOSTFOUND_JWT_SECRET`       |               | random per process    |
//! | `LOSTFOUND_TOKEN_TTL_SECS`   |               | 86400                 |
//! | `LOSTFOUND_MAX_UPLOAD_BYTES` |               | 5 MiB                 |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use tracing::warn;

use crate::media::MAX_UPLOAD_BYTES;

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
/// Longest accepted token lifetime, about ten years.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct Config {
    pub http_port: u16,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub max_upload_bytes: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("data_dir", &self.data_dir)
            .field("uploads_dir", &self.uploads_dir)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl Config {
    /// Defaults rooted at `data_dir`, with a fresh random secret.
    pub fn for_data_dir<P: Into<PathBuf>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.into();
        Ok(Self {
            http_port: DEFAULT_HTTP_PORT,
            uploads_dir: data_dir.join("uploads"),
            data_dir,
            jwt_secret: random_secret()?,
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        })
    }

    /// Load `.env` if present, then read the process environment and `args`.
    pub fn load(args: &[String]) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(target: "startup", "loaded environment from {}", path.display());
        }
        Self::resolve(|name| std::env::var(name).ok(), args)
    }

    /// Resolve from an arbitrary variable lookup; CLI flags override variables.
    pub fn resolve<F>(env: F, args: &[String]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_port = match flag_value(args, "--http-port") {
            Some(v) => parse_value::<u16>("--http-port", &v)?,
            None => env("LOSTFOUND_HTTP_PORT")
                .map(|v| parse_value::<u16>("LOSTFOUND_HTTP_PORT", &v))
                .transpose()?
                .unwrap_or(DEFAULT_HTTP_PORT),
        };
        let data_dir = PathBuf::from(
            flag_value(args, "--data-dir")
                .or_else(|| env("LOSTFOUND_DATA_DIR"))
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );
        let uploads_dir = env("LOSTFOUND_UPLOADS_DIR").map(PathBuf::from).unwrap_or_else(|| data_dir.join("uploads"));
        let jwt_secret = match env("LOSTFOUND_JWT_SECRET") {
            Some(s) => s.into_bytes(),
            None => {
                warn!(target: "startup", "LOSTFOUND_JWT_SECRET is not set; using a random secret, tokens will not survive a restart");
                random_secret()?
            }
        };
        let ttl_secs = env("LOSTFOUND_TOKEN_TTL_SECS")
            .map(|v| parse_value::<u64>("LOSTFOUND_TOKEN_TTL_SECS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        if ttl_secs == 0 {
            return Err(anyhow!("LOSTFOUND_TOKEN_TTL_SECS must be greater than zero"));
        }
        if ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(anyhow!("LOSTFOUND_TOKEN_TTL_SECS must be at most {} (ten years), got {}", MAX_TOKEN_TTL_SECS, ttl_secs));
        }
        let max_upload_bytes = env("LOSTFOUND_MAX_UPLOAD_BYTES")
            .map(|v| parse_value::<usize>("LOSTFOUND_MAX_UPLOAD_BYTES", &v))
            .transpose()?
            .unwrap_or(MAX_UPLOAD_BYTES);

        Ok(Self {
            http_port,
            data_dir,
            uploads_dir,
            jwt_secret,
            token_ttl: Duration::from_secs(ttl_secs),
            max_upload_bytes,
        })
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().with_context(|| format!("invalid value '{}' for {}", raw, name))
}

/// Value following `flag` in `args`, if any.
pub fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).filter(|v| !v.starts_with("--")).cloned();
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn random_secret() -> Result<Vec<u8>> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow!("failed to generate secret: {e}"))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes).into_bytes())
}
