//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use platform::rate_limit::{
    RateLimitConfig, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStore,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{
    api_key::ApiKey,
    audit_event::{AuditAction, AuditEvent},
    csrf_token::CsrfToken,
    oauth_state::OAuthState,
    session::Session,
    user::{User, UserConsents},
};
use crate::domain::repository::{
    ApiKeyRepository, AuditRepository, CsrfRepository, LoginRecord, LoginRepository,
    MaintenanceRepository, OAuthStateRepository, SessionRepository, UserRepository,
};
use crate::domain::value_object::{
    ApiKeyId, SessionId, UserId, role::Role, user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = r#"
    user_id,
    external_id,
    username,
    display_name,
    avatar_url,
    user_role,
    user_status,
    terms_accepted,
    privacy_accepted,
    marketing_opt_in,
    last_login_at,
    created_at,
    updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    session_id,
    user_id,
    token_hash,
    remember_me,
    ip_address,
    user_agent,
    created_at,
    last_activity_at,
    expires_at
"#;

const API_KEY_COLUMNS: &str = r#"
    key_id,
    user_id,
    name,
    key_prefix,
    key_hash,
    permissions,
    is_active,
    expires_at,
    usage_count,
    last_used_at,
    created_at
"#;

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn update_user_role(
        &self,
        user_id: &UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let updated = sqlx::query("UPDATE users SET user_role = $2, updated_at = $3 WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .bind(role.id())
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated)
    }

    async fn update_user_status(
        &self,
        user_id: &UserId,
        status: UserStatus,
        now: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let updated =
            sqlx::query("UPDATE users SET user_status = $2, updated_at = $3 WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .bind(status.id())
                .bind(now)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(updated)
    }

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAuthRepository {
    async fn insert_session(&self, session: &Session) -> AuthResult<()> {
        insert_session(&self.pool, session).await
    }

    async fn find_session_by_token_hash(&self, token_hash: &str) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRow::into_session))
    }

    async fn touch_session(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
        new_expires_at: Option<DateTime<Utc>>,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE user_sessions SET
                last_activity_at = $2,
                expires_at = COALESCE($3, expires_at)
            WHERE session_id = $1
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(now)
        .bind(new_expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_session_by_hash(&self, token_hash: &str) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn revoke_session(&self, session_id: &SessionId, user_id: &UserId) -> AuthResult<u64> {
        let deleted =
            sqlx::query("DELETE FROM user_sessions WHERE session_id = $1 AND user_id = $2")
                .bind(session_id.as_uuid())
                .bind(user_id.as_uuid())
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(deleted)
    }

    async fn list_sessions(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM user_sessions
            WHERE user_id = $1 AND expires_at >= $2
            ORDER BY last_activity_at DESC
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }
}

async fn insert_session<'e, E>(executor: E, session: &Session) -> AuthResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(&format!(
        "INSERT INTO user_sessions ({SESSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
    ))
    .bind(session.session_id.as_uuid())
    .bind(session.user_id.as_uuid())
    .bind(&session.token_hash)
    .bind(session.remember_me)
    .bind(&session.ip_address)
    .bind(&session.user_agent)
    .bind(session.created_at)
    .bind(session.last_activity_at)
    .bind(session.expires_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn append_audit<'e, E>(executor: E, event: &AuditEvent) -> AuthResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO audit_logs (
            user_id,
            actor_id,
            action,
            ip_address,
            user_agent,
            details,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.user_id.map(UserId::into_uuid))
    .bind(event.actor_id.map(UserId::into_uuid))
    .bind(event.action.code())
    .bind(&event.ip_address)
    .bind(&event.user_agent)
    .bind(&event.details)
    .bind(event.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

// ============================================================================
// Login Repository Implementation
// ============================================================================

impl LoginRepository for PgAuthRepository {
    async fn record_login(&self, record: LoginRecord) -> AuthResult<(User, Session)> {
        let LoginRecord {
            profile,
            new_user_id,
            mut session,
            replaced_token_hash,
            client,
            now,
        } = record;

        let mut tx = self.pool.begin().await?;

        // Profile fields follow the provider on every login. Dropping the
        // transaction on an inactive account rolls that back too.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (
                user_id,
                external_id,
                username,
                display_name,
                avatar_url,
                user_role,
                user_status,
                last_login_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $8)
            ON CONFLICT (external_id) DO UPDATE SET
                username = EXCLUDED.username,
                display_name = EXCLUDED.display_name,
                avatar_url = EXCLUDED.avatar_url,
                last_login_at = EXCLUDED.last_login_at,
                updated_at = EXCLUDED.updated_at
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new_user_id.as_uuid())
        .bind(&profile.subject)
        .bind(&profile.username)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(Role::User.id())
        .bind(UserStatus::Active.id())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let user = row.into_user()?;
        if !user.is_active() {
            return Err(AuthError::AccountInactive);
        }

        if let Some(token_hash) = &replaced_token_hash {
            sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
                .bind(token_hash)
                .execute(&mut *tx)
                .await?;
        }

        session.user_id = user.user_id;
        insert_session(&mut *tx, &session).await?;

        let created = user.created_at == now;
        let event = AuditEvent::new(AuditAction::Login, Some(user.user_id), now)
            .from_client(&client)
            .with_details(json!({
                "session_id": session.session_id,
                "remember_me": session.remember_me,
                "new_user": created,
            }));
        append_audit(&mut *tx, &event).await?;

        tx.commit().await?;

        Ok((user, session))
    }
}

// ============================================================================
// API Key Repository Implementation
// ============================================================================

impl ApiKeyRepository for PgAuthRepository {
    async fn insert_api_key(&self, key: &ApiKey) -> AuthResult<()> {
        sqlx::query(&format!(
            "INSERT INTO api_keys ({API_KEY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(key.key_id.as_uuid())
        .bind(key.user_id.as_uuid())
        .bind(&key.name)
        .bind(&key.key_prefix)
        .bind(&key.key_hash)
        .bind(&key.permissions)
        .bind(key.is_active)
        .bind(key.expires_at)
        .bind(key.usage_count)
        .bind(key.last_used_at)
        .bind(key.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> AuthResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = $1"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ApiKeyRow::into_api_key))
    }

    async fn list_api_keys(&self, user_id: &UserId) -> AuthResult<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ApiKeyRow::into_api_key).collect())
    }

    async fn revoke_api_key(&self, key_id: &ApiKeyId, user_id: &UserId) -> AuthResult<u64> {
        let updated = sqlx::query(
            "UPDATE api_keys SET is_active = FALSE WHERE key_id = $1 AND user_id = $2 AND is_active",
        )
        .bind(key_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }

    async fn record_api_key_usage(&self, key_id: &ApiKeyId, now: DateTime<Utc>) -> AuthResult<()> {
        sqlx::query(
            "UPDATE api_keys SET usage_count = usage_count + 1, last_used_at = $2 WHERE key_id = $1",
        )
        .bind(key_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate_api_keys_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let updated =
            sqlx::query("UPDATE api_keys SET is_active = FALSE WHERE user_id = $1 AND is_active")
                .bind(user_id.as_uuid())
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(updated)
    }
}

// ============================================================================
// CSRF Repository Implementation
// ============================================================================

impl CsrfRepository for PgAuthRepository {
    async fn issue_csrf_token(
        &self,
        candidate: &CsrfToken,
        stale_before: DateTime<Utc>,
    ) -> AuthResult<CsrfToken> {
        let inserted = sqlx::query_as::<_, CsrfTokenRow>(
            r#"
            INSERT INTO csrf_tokens (context_key, token, issued_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (context_key) DO UPDATE SET
                token = EXCLUDED.token,
                issued_at = EXCLUDED.issued_at
            WHERE csrf_tokens.issued_at < $4
            RETURNING context_key, token, issued_at
            "#,
        )
        .bind(&candidate.context_key)
        .bind(&candidate.token)
        .bind(candidate.issued_at)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        self.find_csrf_token(&candidate.context_key)
            .await?
            .ok_or_else(|| AuthError::Internal("CSRF token vanished during issue".into()))
    }

    async fn find_csrf_token(&self, context_key: &str) -> AuthResult<Option<CsrfToken>> {
        let row = sqlx::query_as::<_, CsrfTokenRow>(
            "SELECT context_key, token, issued_at FROM csrf_tokens WHERE context_key = $1",
        )
        .bind(context_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_csrf_token(&self, context_key: &str) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM csrf_tokens WHERE context_key = $1")
            .bind(context_key)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// OAuth State Repository Implementation
// ============================================================================

impl OAuthStateRepository for PgAuthRepository {
    async fn put_oauth_state(&self, state: &OAuthState) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_states (
                context_key,
                state,
                nonce,
                redirect_to,
                remember_me,
                created_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (context_key) DO UPDATE SET
                state = EXCLUDED.state,
                nonce = EXCLUDED.nonce,
                redirect_to = EXCLUDED.redirect_to,
                remember_me = EXCLUDED.remember_me,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&state.context_key)
        .bind(&state.state)
        .bind(&state.nonce)
        .bind(&state.redirect_to)
        .bind(state.remember_me)
        .bind(state.created_at)
        .bind(state.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take_oauth_state(&self, context_key: &str) -> AuthResult<Option<OAuthState>> {
        let row = sqlx::query_as::<_, OAuthStateRow>(
            r#"
            DELETE FROM oauth_states
            WHERE context_key = $1
            RETURNING
                context_key,
                state,
                nonce,
                redirect_to,
                remember_me,
                created_at,
                expires_at
            "#,
        )
        .bind(context_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

// ============================================================================
// Audit Repository Implementation
// ============================================================================

impl AuditRepository for PgAuthRepository {
    async fn append_audit(&self, event: &AuditEvent) -> AuthResult<()> {
        append_audit(&self.pool, event).await
    }
}

// ============================================================================
// Maintenance Repository Implementation
// ============================================================================

impl MaintenanceRepository for PgAuthRepository {
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn purge_expired_api_keys(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let updated = sqlx::query(
            "UPDATE api_keys SET is_active = FALSE WHERE is_active AND expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }

    async fn purge_stale_csrf_tokens(&self, stale_before: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM csrf_tokens WHERE issued_at < $1")
            .bind(stale_before)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn purge_expired_oauth_states(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM oauth_states WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Rate Limit Store Implementation
// ============================================================================

fn store_error(e: sqlx::Error) -> RateLimitError {
    RateLimitError::Store(e.to_string())
}

impl RateLimitStore for PgAuthRepository {
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let max = i32::try_from(config.max_requests).unwrap_or(i32::MAX);

        // One statement: open a new window, count within the current one, or
        // leave the row alone when the limit is already reached.
        let counted = sqlx::query_as::<_, (i64, i32)>(
            r#"
            INSERT INTO rate_limits (rate_key, window_start_ms, attempt_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (rate_key) DO UPDATE SET
                window_start_ms = CASE
                    WHEN rate_limits.window_start_ms + $3 <= $2 THEN $2
                    ELSE rate_limits.window_start_ms
                END,
                attempt_count = CASE
                    WHEN rate_limits.window_start_ms + $3 <= $2 THEN 1
                    ELSE rate_limits.attempt_count + 1
                END
            WHERE rate_limits.window_start_ms + $3 <= $2
               OR rate_limits.attempt_count < $4
            RETURNING window_start_ms, attempt_count
            "#,
        )
        .bind(key.as_str())
        .bind(now_ms)
        .bind(config.window_ms())
        .bind(max)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match counted {
            Some((start_ms, count)) => Ok(RateLimitResult {
                allowed: true,
                limit: config.max_requests,
                remaining: config.max_requests.saturating_sub(count.max(0) as u32),
                reset_at_ms: start_ms + config.window_ms(),
            }),
            None => {
                let mut rejected = self.peek(key, config, now_ms).await?;
                rejected.allowed = false;
                rejected.remaining = 0;
                Ok(rejected)
            }
        }
    }

    async fn peek(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let row = sqlx::query_as::<_, (i64, i32)>(
            "SELECT window_start_ms, attempt_count FROM rate_limits WHERE rate_key = $1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        let result = match row {
            Some((start_ms, count)) if start_ms + config.window_ms() > now_ms => {
                let count = count.max(0) as u32;
                RateLimitResult {
                    allowed: count < config.max_requests,
                    limit: config.max_requests,
                    remaining: config.max_requests.saturating_sub(count),
                    reset_at_ms: start_ms + config.window_ms(),
                }
            }
            _ => RateLimitResult {
                allowed: config.max_requests > 0,
                limit: config.max_requests,
                remaining: config.max_requests,
                reset_at_ms: now_ms + config.window_ms(),
            },
        };
        Ok(result)
    }

    async fn purge_stale(&self, older_than_ms: i64) -> Result<u64, RateLimitError> {
        let deleted = sqlx::query("DELETE FROM rate_limits WHERE window_start_ms < $1")
            .bind(older_than_ms)
            .execute(&self.pool)
            .await
            .map_err(store_error)?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    external_id: String,
    username: String,
    display_name: String,
    avatar_url: Option<String>,
    user_role: i16,
    user_status: i16,
    terms_accepted: bool,
    privacy_accepted: bool,
    marketing_opt_in: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let role = Role::from_id(self.user_role)
            .ok_or_else(|| AuthError::Internal(format!("Invalid user_role: {}", self.user_role)))?;
        let status = UserStatus::from_id(self.user_status).ok_or_else(|| {
            AuthError::Internal(format!("Invalid user_status: {}", self.user_status))
        })?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            external_id: self.external_id,
            username: self.username,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            role,
            status,
            consents: UserConsents {
                terms_accepted: self.terms_accepted,
                privacy_accepted: self.privacy_accepted,
                marketing_opt_in: self.marketing_opt_in,
            },
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    token_hash: String,
    remember_me: bool,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            session_id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            token_hash: self.token_hash,
            remember_me: self.remember_me,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    key_id: Uuid,
    user_id: Uuid,
    name: String,
    key_prefix: String,
    key_hash: String,
    permissions: Vec<String>,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    usage_count: i64,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ApiKeyRow {
    fn into_api_key(self) -> ApiKey {
        ApiKey {
            key_id: ApiKeyId::from_uuid(self.key_id),
            user_id: UserId::from_uuid(self.user_id),
            name: self.name,
            key_prefix: self.key_prefix,
            key_hash: self.key_hash,
            permissions: self.permissions,
            is_active: self.is_active,
            expires_at: self.expires_at,
            usage_count: self.usage_count,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CsrfTokenRow {
    context_key: String,
    token: String,
    issued_at: DateTime<Utc>,
}

impl From<CsrfTokenRow> for CsrfToken {
    fn from(row: CsrfTokenRow) -> Self {
        Self {
            context_key: row.context_key,
            token: row.token,
            issued_at: row.issued_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OAuthStateRow {
    context_key: String,
    state: String,
    nonce: String,
    redirect_to: String,
    remember_me: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<OAuthStateRow> for OAuthState {
    fn from(row: OAuthStateRow) -> Self {
        Self {
            context_key: row.context_key,
            state: row.state,
            nonce: row.nonce,
            redirect_to: row.redirect_to,
            remember_me: row.remember_me,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}
