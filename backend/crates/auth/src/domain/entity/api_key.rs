//! API Key Entity
//!
//! Raw keys are shown once at creation. Only the hash is stored and compared.

use chrono::{DateTime, Utc};
use platform::secret::Secret;

use crate::domain::value_object::{ApiKeyId, UserId, permission::PermissionSet};

/// Raw keys look like `bfx_<64 hex chars>`.
pub const API_KEY_PREFIX: &str = "bfx_";
/// Stored, non-secret leading part of a raw key, for recognizing it in lists.
pub const DISPLAY_PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub key_id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key_prefix: String,
    pub key_hash: String,
    /// Capability names; `["*"]` inherits everything the owner's role grants
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    pub fn permission_set(&self) -> PermissionSet {
        PermissionSet::from_names(&self.permissions)
    }
}

/// Returned exactly once from key creation
#[derive(Debug)]
pub struct ApiKeyCreated {
    pub key: ApiKey,
    pub raw_key: Secret,
}
