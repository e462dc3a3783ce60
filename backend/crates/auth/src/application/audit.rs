//! Audit Log
//!
//! Best effort: a failed audit write is logged and swallowed.

use std::sync::Arc;

use crate::domain::entity::audit_event::AuditEvent;
use crate::domain::repository::AuditRepository;

pub struct AuditLog<R: AuditRepository> {
    repo: Arc<R>,
}

impl<R: AuditRepository> Clone for AuditLog<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: AuditRepository> AuditLog<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.repo.append_audit(&event).await {
            tracing::warn!(
                action = event.action.code(),
                user_id = ?event.user_id,
                error = %e,
                "Failed to write audit event"
            );
        }
    }
}
