//! Account Administration
//!
//! Role and status changes and account deletion, performed by users holding
//! `manage_users`. Below super admin, an actor may only act on users of lower
//! rank and may not grant a role above their own.

use std::sync::Arc;

use platform::client::ClientContext;
use platform::clock::Clock;
use serde_json::json;

use crate::application::audit::AuditLog;
use crate::application::identity::{Identity, require_permission};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::entity::user::User;
use crate::domain::repository::{
    ApiKeyRepository, AuditRepository, SessionRepository, UserRepository,
};
use crate::domain::value_object::permission::Permission;
use crate::domain::value_object::{UserId, role::Role, user_status::UserStatus};
use crate::error::{AuthError, AuthResult};

pub struct AccountAdmin<R>
where
    R: UserRepository + SessionRepository + ApiKeyRepository + AuditRepository,
{
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    audit: AuditLog<R>,
}

impl<R> AccountAdmin<R>
where
    R: UserRepository + SessionRepository + ApiKeyRepository + AuditRepository,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            audit: AuditLog::new(repo.clone()),
            repo,
            clock,
        }
    }

    async fn load_target(&self, actor: &Identity, target: &UserId) -> AuthResult<User> {
        require_permission(Some(actor), &Permission::ManageUsers.to_string())?;

        let user = self
            .repo
            .find_user_by_id(target)
            .await?
            .ok_or(AuthError::NotFound("User"))?;

        if !actor.role().is_super_admin() && user.role >= actor.role() {
            return Err(AuthError::PermissionDenied(
                "target has equal or higher rank".into(),
            ));
        }
        Ok(user)
    }

    pub async fn set_role(
        &self,
        actor: &Identity,
        target: &UserId,
        role: Role,
        client: &ClientContext,
    ) -> AuthResult<()> {
        let user = self.load_target(actor, target).await?;
        if !actor.role().is_super_admin() && role > actor.role() {
            return Err(AuthError::PermissionDenied(format!("cannot grant {role}")));
        }

        let now = self.clock.now();
        self.repo.update_user_role(target, role, now).await?;

        tracing::info!(actor_id = %actor.user_id(), user_id = %target, from = %user.role, to = %role, "Role changed");
        self.audit
            .record(
                AuditEvent::new(AuditAction::RoleChanged, Some(*target), now)
                    .by(actor.user_id())
                    .from_client(client)
                    .with_details(json!({ "from": user.role, "to": role })),
            )
            .await;
        Ok(())
    }

    /// Deactivation also ends every session of the user.
    pub async fn set_status(
        &self,
        actor: &Identity,
        target: &UserId,
        status: UserStatus,
        client: &ClientContext,
    ) -> AuthResult<()> {
        let user = self.load_target(actor, target).await?;

        let now = self.clock.now();
        self.repo.update_user_status(target, status, now).await?;
        let sessions_removed = if status.is_active() {
            0
        } else {
            self.repo.delete_sessions_for_user(target).await?
        };

        tracing::info!(
            actor_id = %actor.user_id(),
            user_id = %target,
            status = %status,
            sessions_removed,
            "Status changed"
        );
        self.audit
            .record(
                AuditEvent::new(AuditAction::StatusChanged, Some(*target), now)
                    .by(actor.user_id())
                    .from_client(client)
                    .with_details(json!({
                        "from": user.status,
                        "to": status,
                        "sessions_removed": sessions_removed,
                    })),
            )
            .await;
        Ok(())
    }

    /// Revokes sessions, deactivates keys, then removes the user.
    pub async fn delete_account(
        &self,
        actor: &Identity,
        target: &UserId,
        client: &ClientContext,
    ) -> AuthResult<()> {
        let user = self.load_target(actor, target).await?;

        let sessions_removed = self.repo.delete_sessions_for_user(target).await?;
        let keys_deactivated = self.repo.deactivate_api_keys_for_user(target).await?;
        self.repo.delete_user(target).await?;

        tracing::info!(
            actor_id = %actor.user_id(),
            user_id = %target,
            sessions_removed,
            keys_deactivated,
            "Account deleted"
        );
        self.audit
            .record(
                AuditEvent::new(AuditAction::AccountDeleted, None, self.clock.now())
                    .by(actor.user_id())
                    .from_client(client)
                    .with_details(json!({
                        "deleted_user_id": user.user_id,
                        "external_id": user.external_id,
                    })),
            )
            .await;
        Ok(())
    }
}
