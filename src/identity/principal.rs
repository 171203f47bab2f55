use serde::{Deserialize, Serialize};

use crate::model::{Role, UserId};

/// Authenticated caller as resolved from a verified token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self { Self { user_id, role } }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
