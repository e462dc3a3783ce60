//! User Entity
//!
//! Created on the first successful provider login, refreshed on every later
//! one. The provider subject id is unique.

use chrono::{DateTime, Utc};

use crate::domain::provider::ProviderProfile;
use crate::domain::value_object::{UserId, permission::PermissionSet, role::Role, user_status::UserStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserConsents {
    pub terms_accepted: bool,
    pub privacy_accepted: bool,
    pub marketing_opt_in: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    /// Provider subject id
    pub external_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub consents: UserConsents,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// First login: active, lowest role.
    pub fn from_profile(user_id: UserId, profile: &ProviderProfile, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            external_id: profile.subject.clone(),
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            role: Role::User,
            status: UserStatus::Active,
            consents: UserConsents::default(),
            last_login_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Later logins: profile fields follow the provider, role and status stay.
    pub fn apply_profile(&mut self, profile: &ProviderProfile, now: DateTime<Utc>) {
        self.username = profile.username.clone();
        self.display_name = profile.display_name.clone();
        self.avatar_url = profile.avatar_url.clone();
        self.last_login_at = Some(now);
        self.updated_at = now;
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn permissions(&self) -> PermissionSet {
        self.role.permissions()
    }
}
