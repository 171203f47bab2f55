//!
//! lostfound storage module
//! -------------------------
//! Document-style persistence for users and items. Each collection is held in
//! memory behind a `parking_lot::RwLock` and, when opened with a data directory,
//! mirrored to a JSON snapshot (`users.json`, `items.json`) after every write.
//!
//! Key responsibilities:
//! - Id generation and `createdAt`/`updatedAt` stamping on write.
//! - Predicate listing ordered newest first.
//! - Atomic read-modify-write of a single item (`ItemRepository::transition`),
//!   which is what keeps two concurrent claims from both succeeding.
//!
//! A directory opened with `Stores::open` is held under an exclusive OS file lock
//! (`lostfound.lock`) until the last handle drops, so a second process cannot
//! load the same snapshots and later overwrite the first one's writes.
//!
//! The workflow and HTTP layers only see the `ItemRepository`/`UserRepository`
//! traits, so another document store can be slotted in behind them.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use thiserror::Error;

use crate::error::{AppError, AppResult};
use crate::model::{Item, ItemId, ItemKind, ItemStatus, NewItem, Role, User, UserId};

mod snapshot;
pub mod items;
pub mod users;

pub use items::ItemStore;
pub use users::UserStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("snapshot {path} is not valid JSON: {source}")]
    Corrupt { path: PathBuf, #[source] source: serde_json::Error },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!(target: "lostfound::storage", "repository failure: {}", err);
        AppError::storage("repository_unavailable".to_string(), format!("item repository failure: {err}"))
    }
}

/// Find-by-predicate filter. Every populated field must match.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Accept any of these statuses; `None` accepts all.
    pub statuses: Option<Vec<ItemStatus>>,
    pub kind: Option<ItemKind>,
    /// Case-insensitive substring over description, location and name.
    pub text: Option<String>,
    pub owner: Option<UserId>,
}

impl ItemFilter {
    pub fn status(status: ItemStatus) -> Self { Self { statuses: Some(vec![status]), ..Default::default() } }

    pub fn with_kind(mut self, kind: Option<ItemKind>) -> Self { self.kind = kind; self }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self
    }

    pub fn with_owner(mut self, owner: UserId) -> Self { self.owner = Some(owner); self }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&item.status) { return false; }
        }
        if let Some(kind) = self.kind {
            if item.kind != kind { return false; }
        }
        if let Some(owner) = self.owner {
            if item.created_by != owner { return false; }
        }
        if let Some(needle) = &self.text {
            let needle = needle.to_lowercase();
            let hit = |field: Option<&str>| field.map(|f| f.to_lowercase().contains(&needle)).unwrap_or(false);
            if !(hit(Some(&item.description)) || hit(item.location.as_deref()) || hit(item.name.as_deref())) {
                return false;
            }
        }
        true
    }
}

pub trait ItemRepository: Send + Sync {
    /// Insert a pending item, assigning id and timestamps.
    fn insert(&self, new: NewItem) -> AppResult<Item>;
    fn find(&self, id: ItemId) -> AppResult<Option<Item>>;
    /// Snapshot of matching items, newest first.
    fn list(&self, filter: &ItemFilter) -> AppResult<Vec<Item>>;
    /// Load, check and replace one item as a single atomic step. `apply` sees the
    /// current item and returns its replacement or an error; on error nothing is
    /// written. `updatedAt` is stamped by the repository.
    fn transition(&self, id: ItemId, apply: &dyn Fn(&Item) -> AppResult<Item>) -> AppResult<Item>;
    /// Remove an item, returning it if it existed.
    fn delete(&self, id: ItemId) -> AppResult<Option<Item>>;
    fn count(&self) -> AppResult<usize>;
}

pub trait UserRepository: Send + Sync {
    /// Insert a new account. Fails with Conflict when the email is taken.
    fn insert(&self, name: &str, email: &str, password_hash: &str, role: Role) -> AppResult<User>;
    fn find(&self, id: UserId) -> AppResult<Option<User>>;
    fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Replace the mutable fields of an account (name, password hash, role).
    fn update(&self, id: UserId, apply: &dyn Fn(&mut User)) -> AppResult<User>;
    fn count(&self) -> AppResult<usize>;
}

pub const LOCK_FILE: &str = "lostfound.lock";

/// Exclusive hold on a data directory. The OS releases it when the file
/// closes, including when the process dies.
struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(anyhow!(
                "data directory {} is in use by another lostfound process; stop it first",
                data_dir.display()
            ));
        }
        tracing::debug!(target: "lostfound::storage", "locked {}", path.display());
        Ok(Self { file, path })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        tracing::debug!(target: "lostfound::storage", "released {}", self.path.display());
    }
}

/// Handles to both collections, shared by every request.
#[derive(Clone)]
pub struct Stores {
    pub items: Arc<dyn ItemRepository>,
    pub users: Arc<dyn UserRepository>,
    _lock: Option<Arc<DirLock>>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// Open (or create) the JSON-backed collections under `data_dir`. Fails if
    /// another live `Stores` already holds the directory.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create or access data dir: {}", data_dir.display()))?;
        let lock = DirLock::acquire(data_dir)?;
        let items = ItemStore::open(data_dir.join("items.json"))
            .with_context(|| format!("While loading items under {}", data_dir.display()))?;
        let users = UserStore::open(data_dir.join("users.json"))
            .with_context(|| format!("While loading users under {}", data_dir.display()))?;
        Ok(Self { items: Arc::new(items), users: Arc::new(users), _lock: Some(Arc::new(lock)) })
    }

    /// Volatile collections, used by tests and benches.
    pub fn in_memory() -> Self {
        Self { items: Arc::new(ItemStore::in_memory()), users: Arc::new(UserStore::in_memory()), _lock: None }
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
