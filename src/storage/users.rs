use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::snapshot::SnapshotFile;
use super::{StoreError, UserRepository};
use crate::error::{AppError, AppResult};
use crate::model::{Role, User, UserId};
use crate::security::normalize_email;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    /// Secondary unique index: normalized email -> id.
    by_email: HashMap<String, UserId>,
}

impl Inner {
    fn rows(&self) -> Vec<&User> {
        let mut rows: Vec<&User> = self.users.values().collect();
        rows.sort_by_key(|u| u.created_at);
        rows
    }
}

pub struct UserStore {
    inner: RwLock<Inner>,
    snapshot: Option<SnapshotFile>,
}

impl UserStore {
    pub fn in_memory() -> Self { Self { inner: RwLock::new(Inner::default()), snapshot: None } }

    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let snapshot = SnapshotFile::new(path);
        let rows: Vec<User> = snapshot.load()?;
        let mut inner = Inner::default();
        for user in rows {
            inner.by_email.insert(normalize_email(&user.email), user.id);
            inner.users.insert(user.id, user);
        }
        Ok(Self { inner: RwLock::new(inner), snapshot: Some(snapshot) })
    }

    fn persist(&self, inner: &Inner) -> AppResult<()> {
        let Some(snapshot) = &self.snapshot else { return Ok(()); };
        snapshot.save(&inner.rows())?;
        Ok(())
    }
}

impl UserRepository for UserStore {
    fn insert(&self, name: &str, email: &str, password_hash: &str, role: Role) -> AppResult<User> {
        let key = normalize_email(email);
        let mut inner = self.inner.write();
        if inner.by_email.contains_key(&key) {
            return Err(AppError::conflict("email_taken", "User already exists"));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: key.clone(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        inner.by_email.insert(key.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        if let Err(e) = self.persist(&inner) {
            inner.by_email.remove(&key);
            inner.users.remove(&user.id);
            return Err(e);
        }
        debug!(target: "lostfound::storage", "users.insert id={} role={}", user.id, user.role);
        Ok(user)
    }

    fn find(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read();
        Ok(inner.by_email.get(&normalize_email(email)).and_then(|id| inner.users.get(id)).cloned())
    }

    fn update(&self, id: UserId, apply: &dyn Fn(&mut User)) -> AppResult<User> {
        let mut inner = self.inner.write();
        let Some(current) = inner.users.get(&id).cloned() else {
            return Err(AppError::not_found("user_not_found", "User not found"));
        };
        let mut next = current.clone();
        apply(&mut next);
        // Email and identity are fixed once created.
        next.id = current.id;
        next.email = current.email.clone();
        next.created_at = current.created_at;
        next.updated_at = Utc::now();
        inner.users.insert(id, next.clone());
        if let Err(e) = self.persist(&inner) {
            inner.users.insert(id, current);
            return Err(e);
        }
        debug!(target: "lostfound::storage", "users.update id={} role={}", id, next.role);
        Ok(next)
    }

    fn count(&self) -> AppResult<usize> { Ok(self.inner.read().users.len()) }
}
