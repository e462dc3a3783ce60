//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::identity::{AuthMethod, Identity};
use crate::domain::entity::api_key::ApiKey;
use crate::domain::entity::session::SessionInfo;
use crate::domain::value_object::{ApiKeyId, SessionId, UserId, role::Role, user_status::UserStatus};

// ============================================================================
// Login
// ============================================================================

/// `?redirect=/path&remember=1`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
    pub remember: Option<String>,
}

impl LoginQuery {
    pub fn remember_me(&self) -> bool {
        matches!(
            self.remember.as_deref().map(str::trim),
            Some("1" | "true" | "on" | "yes")
        )
    }
}

/// Provider redirect parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// ============================================================================
// CSRF
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CsrfResponse {
    pub token: String,
}

// ============================================================================
// Session Status
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

/// Session status response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub authenticated: bool,
    pub user: Option<UserResponse>,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionStatusResponse {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user: None,
            permissions: Vec::new(),
            expires_at: None,
        }
    }
}

/// The authenticated principal, as `/api/v1/me` reports it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalResponse {
    pub user: UserResponse,
    pub method: AuthMethod,
    pub permissions: Vec<String>,
    pub api_key_id: Option<ApiKeyId>,
}

impl From<&Identity> for UserResponse {
    fn from(identity: &Identity) -> Self {
        let user = &identity.user;
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            role: user.role,
            status: user.status,
        }
    }
}

impl From<&Identity> for SessionStatusResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            authenticated: true,
            user: Some(identity.into()),
            permissions: identity.permissions.to_vec(),
            expires_at: identity.session_expires_at,
        }
    }
}

impl From<&Identity> for PrincipalResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            user: identity.into(),
            method: identity.method,
            permissions: identity.permissions.to_vec(),
            api_key_id: identity.api_key_id,
        }
    }
}

// ============================================================================
// Session Management
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub remember_me: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub current: bool,
}

impl From<SessionInfo> for SessionResponse {
    fn from(info: SessionInfo) -> Self {
        Self {
            session_id: info.session_id,
            remember_me: info.remember_me,
            ip_address: info.ip_address,
            user_agent: info.user_agent,
            created_at: info.created_at,
            last_activity_at: info.last_activity_at,
            expires_at: info.expires_at,
            current: info.current,
        }
    }
}

// ============================================================================
// API Keys
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub expires_in_days: Option<u32>,
}

/// Never includes the hash
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub key_id: ApiKeyId,
    pub name: String,
    pub key_prefix: String,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            key_id: key.key_id,
            name: key.name,
            key_prefix: key.key_prefix,
            permissions: key.permissions,
            is_active: key.is_active,
            expires_at: key.expires_at,
            usage_count: key.usage_count,
            last_used_at: key.last_used_at,
            created_at: key.created_at,
        }
    }
}

/// Returned once, on creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreatedResponse {
    /// Raw key; shown only in this response
    pub api_key: String,
    pub key: ApiKeyResponse,
}

// ============================================================================
// Administration
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: UserStatus,
}
