use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::snapshot::SnapshotFile;
use super::{ItemFilter, ItemRepository, StoreError};
use crate::error::{AppError, AppResult};
use crate::model::{ContactDetails, Item, ItemId, ItemStatus, NewItem};

#[derive(Debug, Clone)]
struct Entry {
    /// Insertion order; breaks `createdAt` ties so listings are stable.
    seq: u64,
    item: Item,
}

#[derive(Default)]
struct Inner {
    map: HashMap<ItemId, Entry>,
    next_seq: u64,
}

impl Inner {
    fn ordered(&self) -> Vec<&Entry> {
        let mut rows: Vec<&Entry> = self.map.values().collect();
        rows.sort_by(|a, b| (a.item.created_at, a.seq).cmp(&(b.item.created_at, b.seq)));
        rows
    }
}

/// Item collection. All mutation happens under the write lock, and the snapshot
/// (when configured) is rewritten before the lock is released.
pub struct ItemStore {
    inner: RwLock<Inner>,
    snapshot: Option<SnapshotFile>,
}

impl ItemStore {
    pub fn in_memory() -> Self { Self { inner: RwLock::new(Inner::default()), snapshot: None } }

    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let snapshot = SnapshotFile::new(path);
        let rows: Vec<Item> = snapshot.load()?;
        let mut inner = Inner::default();
        for item in rows {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.map.insert(item.id, Entry { seq, item });
        }
        Ok(Self { inner: RwLock::new(inner), snapshot: Some(snapshot) })
    }

    fn persist(&self, inner: &Inner) -> AppResult<()> {
        let Some(snapshot) = &self.snapshot else { return Ok(()); };
        let rows: Vec<&Item> = inner.ordered().into_iter().map(|e| &e.item).collect();
        snapshot.save(&rows)?;
        Ok(())
    }
}

impl ItemRepository for ItemStore {
    fn insert(&self, new: NewItem) -> AppResult<Item> {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            description: new.description,
            image: new.image,
            kind: new.kind,
            name: new.name,
            category: new.category,
            location: new.location,
            contact_details: ContactDetails { email: new.contact_email },
            status: ItemStatus::Pending,
            rejection_reason: None,
            created_by: new.owner,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.map.insert(item.id, Entry { seq, item: item.clone() });
        if let Err(e) = self.persist(&inner) {
            inner.map.remove(&item.id);
            return Err(e);
        }
        debug!(target: "lostfound::storage", "items.insert id={} owner={}", item.id, item.created_by);
        Ok(item)
    }

    fn find(&self, id: ItemId) -> AppResult<Option<Item>> {
        Ok(self.inner.read().map.get(&id).map(|e| e.item.clone()))
    }

    fn list(&self, filter: &ItemFilter) -> AppResult<Vec<Item>> {
        let inner = self.inner.read();
        Ok(inner.ordered().into_iter().rev().filter(|e| filter.matches(&e.item)).map(|e| e.item.clone()).collect())
    }

    fn transition(&self, id: ItemId, apply: &dyn Fn(&Item) -> AppResult<Item>) -> AppResult<Item> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.map.get(&id) else {
            return Err(AppError::not_found("item_not_found", "Item not found"));
        };
        let previous = entry.item.clone();
        let mut next = apply(&previous)?;
        // Identity and provenance are owned by the repository.
        next.id = previous.id;
        next.created_by = previous.created_by;
        next.created_at = previous.created_at;
        next.updated_at = Utc::now();
        if let Some(entry) = inner.map.get_mut(&id) { entry.item = next.clone(); }
        if let Err(e) = self.persist(&inner) {
            if let Some(entry) = inner.map.get_mut(&id) { entry.item = previous; }
            return Err(e);
        }
        debug!(target: "lostfound::storage", "items.transition id={} status={}", id, next.status);
        Ok(next)
    }

    fn delete(&self, id: ItemId) -> AppResult<Option<Item>> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.map.remove(&id) else { return Ok(None); };
        if let Err(e) = self.persist(&inner) {
            inner.map.insert(id, entry);
            return Err(e);
        }
        debug!(target: "lostfound::storage", "items.delete id={}", id);
        Ok(Some(entry.item))
    }

    fn count(&self) -> AppResult<usize> { Ok(self.inner.read().map.len()) }
}
