use super::principal::Principal;
use crate::error::{AppError, AppResult};
use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    /// Any valid token.
    Authenticated,
    Admin,
}

/// Role-gated operations on items. Public reads (approved listing, claimed view)
/// are not listed because they need no identity at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOperation {
    Submit,
    Approve,
    Reject,
    Claim,
    Remove,
    ListAll,
    ListPending,
    ListMine,
}

impl ItemOperation {
    pub fn required_role(&self) -> RequiredRole {
        match self {
            ItemOperation::Submit | ItemOperation::Claim | ItemOperation::ListMine => RequiredRole::Authenticated,
            // Delete is admin-only even though some deployments let owners delete.
            ItemOperation::Approve
            | ItemOperation::Reject
            | ItemOperation::Remove
            | ItemOperation::ListAll
            | ItemOperation::ListPending => RequiredRole::Admin,
        }
    }
}

pub fn authorize(principal: &Principal, required: RequiredRole) -> AppResult<()> {
    match required {
        RequiredRole::Authenticated => Ok(()),
        RequiredRole::Admin if principal.role == Role::Admin => Ok(()),
        RequiredRole::Admin => Err(AppError::forbidden("admin_required", "Access denied, admin only")),
    }
}

pub fn check_operation_allowed(principal: &Principal, op: ItemOperation) -> AppResult<()> {
    authorize(principal, op.required_role()).inspect_err(|_| {
        tracing::debug!(target: "lostfound::identity", "denied op={:?} user={} role={}", op, principal.user_id, principal.role);
    })
}
