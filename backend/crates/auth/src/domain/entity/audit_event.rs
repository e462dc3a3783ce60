//! Audit Event Entity

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::value_object::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
    SessionRevoked,
    ApiKeyCreated,
    ApiKeyRevoked,
    RoleChanged,
    StatusChanged,
    AccountDeleted,
}

impl AuditAction {
    pub const fn code(&self) -> &'static str {
        use AuditAction::*;
        match self {
            Login => "login",
            Logout => "logout",
            SessionRevoked => "session_revoked",
            ApiKeyCreated => "api_key_created",
            ApiKeyRevoked => "api_key_revoked",
            RoleChanged => "role_changed",
            StatusChanged => "status_changed",
            AccountDeleted => "account_deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// Subject of the action
    pub user_id: Option<UserId>,
    /// Who did it, when different from the subject
    pub actor_id: Option<UserId>,
    pub action: AuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, user_id: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            actor_id: None,
            action,
            ip_address: None,
            user_agent: None,
            details: Value::Null,
            created_at: now,
        }
    }

    pub fn by(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn from_client(mut self, client: &platform::client::ClientContext) -> Self {
        self.ip_address = client.ip_string();
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}
