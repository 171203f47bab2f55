//!
//! Item workflow engine
//! ---------------------
//! Owns the item lifecycle and the role checks in front of each transition:
//!
//! ```text
//!   submit -> pending --approve--> approved --claim--> claimed
//!                |                    ^
//!                +--reject--> rejected+ (approve again)
//! ```
//!
//! Every transition runs inside `ItemRepository::transition`, so the status
//! check and the write happen as one step per item. Claimed items never leave
//! `claimed`; pending and rejected items can never be claimed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{check_operation_allowed, ItemOperation, Principal};
use crate::media::{MediaStore, Upload};
use crate::model::{Item, ItemId, ItemKind, ItemStatus, NewItem, UserId};
use crate::security;
use crate::storage::{ItemFilter, ItemRepository, UserRepository};

pub const DEFAULT_REJECTION_REASON: &str = "Rejected by administrator";

/// Fields of a submission as received, before validation.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub description: String,
    pub kind: Option<ItemKind>,
    pub contact_email: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
}

fn optional_text(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Submission {
    /// Check required fields and normalize optional ones. The image reference is
    /// attached separately once the upload has been stored.
    pub fn validate(self, owner: UserId, image: String) -> AppResult<NewItem> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(AppError::validation("description_required", "Description is required"));
        }
        let Some(kind) = self.kind else {
            return Err(AppError::validation("type_required", "Item type is required (lost or found)"));
        };
        let Some(contact_email) = optional_text(self.contact_email) else {
            return Err(AppError::validation("contact_required", "Contact email is required"));
        };
        if !security::is_valid_email(&contact_email) {
            return Err(AppError::validation("invalid_email", "Contact email is not a valid email address"));
        }
        if image.trim().is_empty() {
            return Err(AppError::validation("image_required", "Image is required"));
        }
        Ok(NewItem {
            description,
            image,
            kind,
            contact_email,
            owner,
            name: optional_text(self.name),
            category: optional_text(self.category),
            location: optional_text(self.location),
        })
    }
}

/// pending/approved/rejected -> approved. Clears any rejection reason.
pub fn approved(item: &Item) -> AppResult<Item> {
    if item.status == ItemStatus::Claimed {
        return Err(AppError::state("already_claimed", "Claimed items cannot be re-approved"));
    }
    let mut next = item.clone();
    next.status = ItemStatus::Approved;
    next.rejection_reason = None;
    Ok(next)
}

/// pending -> rejected with a reason.
pub fn rejected(item: &Item, reason: &str) -> AppResult<Item> {
    if item.status != ItemStatus::Pending {
        return Err(AppError::state("not_pending".to_string(), format!("Only pending items can be rejected (item is {})", item.status)));
    }
    let mut next = item.clone();
    next.status = ItemStatus::Rejected;
    next.rejection_reason = Some(reason.to_string());
    Ok(next)
}

/// approved -> claimed, recording who and when.
pub fn claimed(item: &Item, by: UserId, at: DateTime<Utc>) -> AppResult<Item> {
    match item.status {
        ItemStatus::Claimed => Err(AppError::conflict("already_claimed", "Item is already claimed")),
        ItemStatus::Approved => {
            let mut next = item.clone();
            next.status = ItemStatus::Claimed;
            next.claimed_by = Some(by);
            next.claimed_at = Some(at);
            Ok(next)
        }
        ItemStatus::Pending | ItemStatus::Rejected => Err(AppError::state("not_claimable", "Only approved items can be claimed")),
    }
}

/// Whether `caller` may see `item` outside the admin views.
pub fn visible_to(item: &Item, caller: Option<&Principal>) -> bool {
    if matches!(item.status, ItemStatus::Approved | ItemStatus::Claimed) { return true; }
    match caller {
        Some(p) => p.is_admin() || p.user_id == item.created_by,
        None => false,
    }
}

pub struct ItemWorkflow {
    items: Arc<dyn ItemRepository>,
    users: Arc<dyn UserRepository>,
    media: Arc<dyn MediaStore>,
}

impl ItemWorkflow {
    pub fn new(items: Arc<dyn ItemRepository>, users: Arc<dyn UserRepository>, media: Arc<dyn MediaStore>) -> Self {
        Self { items, users, media }
    }

    /// Create a pending item from an already stored image reference.
    pub fn submit(&self, caller: &Principal, submission: Submission, image_ref: String) -> AppResult<Item> {
        check_operation_allowed(caller, ItemOperation::Submit)?;
        let new = submission.validate(caller.user_id, image_ref)?;
        if self.users.find(caller.user_id)?.is_none() {
            return Err(AppError::not_found("user_not_found", "Submitting user does not exist"));
        }
        let item = self.items.insert(new)?;
        info!(target: "lostfound::workflow", "item.submit id={} owner={} type={}", item.id, item.created_by, item.kind);
        Ok(item)
    }

    /// Validate the submission, store the upload, then create the item. No item
    /// exists unless the image was stored, and no image is kept unless the item
    /// was created.
    pub fn submit_upload(&self, caller: &Principal, submission: Submission, upload: Option<Upload>) -> AppResult<Item> {
        check_operation_allowed(caller, ItemOperation::Submit)?;
        let Some(upload) = upload else {
            return Err(AppError::validation("image_required", "Image is required"));
        };
        // Field errors are reported before anything touches the media store.
        submission.clone().validate(caller.user_id, "pending-upload".to_string())?;
        let image_ref = self.media.store(&upload)?;
        match self.submit(caller, submission, image_ref.clone()) {
            Ok(item) => Ok(item),
            Err(e) => {
                if let Err(cleanup) = self.media.remove(&image_ref) {
                    warn!(target: "lostfound::workflow", "orphaned upload '{}' after failed submit: {}", image_ref, cleanup);
                }
                Err(e)
            }
        }
    }

    pub fn approve(&self, caller: &Principal, id: ItemId) -> AppResult<Item> {
        check_operation_allowed(caller, ItemOperation::Approve)?;
        let item = self.items.transition(id, &approved)?;
        info!(target: "lostfound::workflow", "item.approve id={} by={}", id, caller.user_id);
        Ok(item)
    }

    pub fn reject(&self, caller: &Principal, id: ItemId, reason: Option<&str>) -> AppResult<Item> {
        check_operation_allowed(caller, ItemOperation::Reject)?;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REJECTION_REASON);
        let item = self.items.transition(id, &|cur| rejected(cur, reason))?;
        info!(target: "lostfound::workflow", "item.reject id={} by={}", id, caller.user_id);
        Ok(item)
    }

    pub fn claim(&self, caller: &Principal, id: ItemId) -> AppResult<Item> {
        check_operation_allowed(caller, ItemOperation::Claim)?;
        let now = Utc::now();
        let item = self.items.transition(id, &|cur| claimed(cur, caller.user_id, now))?;
        info!(target: "lostfound::workflow", "item.claim id={} by={}", id, caller.user_id);
        Ok(item)
    }

    /// Delete regardless of status; the stored image goes with it.
    pub fn remove(&self, caller: &Principal, id: ItemId) -> AppResult<()> {
        check_operation_allowed(caller, ItemOperation::Remove)?;
        let Some(item) = self.items.delete(id)? else {
            return Err(AppError::not_found("item_not_found", "Item not found"));
        };
        if let Err(e) = self.media.remove(&item.image) {
            warn!(target: "lostfound::workflow", "image '{}' of deleted item {} not removed: {}", item.image, id, e);
        }
        info!(target: "lostfound::workflow", "item.delete id={} by={} status={}", id, caller.user_id, item.status);
        Ok(())
    }

    /// Unfiltered access for callers that already enforced visibility.
    pub fn list(&self, filter: &ItemFilter) -> AppResult<Vec<Item>> { self.items.list(filter) }

    /// Public listing: approved items, or claimed items when `claimed_view` is set.
    pub fn list_public(&self, kind: Option<ItemKind>, text: Option<String>, claimed_view: bool) -> AppResult<Vec<Item>> {
        let status = if claimed_view { ItemStatus::Claimed } else { ItemStatus::Approved };
        self.items.list(&ItemFilter::status(status).with_kind(kind).with_text(text))
    }

    pub fn list_all(&self, caller: &Principal, filter: &ItemFilter) -> AppResult<Vec<Item>> {
        check_operation_allowed(caller, ItemOperation::ListAll)?;
        self.items.list(filter)
    }

    pub fn list_pending(&self, caller: &Principal) -> AppResult<Vec<Item>> {
        check_operation_allowed(caller, ItemOperation::ListPending)?;
        self.items.list(&ItemFilter::status(ItemStatus::Pending))
    }

    pub fn list_mine(&self, caller: &Principal) -> AppResult<Vec<Item>> {
        check_operation_allowed(caller, ItemOperation::ListMine)?;
        self.items.list(&ItemFilter::default().with_owner(caller.user_id))
    }

    /// Single item, hidden as not-found when the caller may not see it.
    pub fn get(&self, caller: Option<&Principal>, id: ItemId) -> AppResult<Item> {
        match self.items.find(id)? {
            Some(item) if visible_to(&item, caller) => Ok(item),
            _ => Err(AppError::not_found("item_not_found", "Item not found")),
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
