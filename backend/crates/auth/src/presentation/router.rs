//! Auth Router

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::domain::provider::OAuthTransport;
use crate::domain::repository::AuthStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{api_auth, resolve_identity};

/// Browser-facing routes; mount under `/auth`.
pub fn auth_router<R, T>(state: AuthAppState<R, T>) -> Router
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    Router::new()
        .route(
            "/login",
            get(handlers::login::<R, T>).post(handlers::login::<R, T>),
        )
        .route("/callback", get(handlers::callback::<R, T>))
        .route("/logout", post(handlers::logout::<R, T>))
        .route("/csrf", get(handlers::csrf_token::<R, T>))
        .route("/session", get(handlers::session_status))
        .route("/sessions", get(handlers::list_sessions::<R, T>))
        .route("/sessions/{id}", delete(handlers::revoke_session::<R, T>))
        .route(
            "/api-keys",
            get(handlers::list_api_keys::<R, T>).post(handlers::create_api_key::<R, T>),
        )
        .route("/api-keys/{id}", delete(handlers::revoke_api_key::<R, T>))
        .route(
            "/admin/users/{id}/role",
            post(handlers::set_user_role::<R, T>),
        )
        .route(
            "/admin/users/{id}/status",
            post(handlers::set_user_status::<R, T>),
        )
        .route("/admin/users/{id}", delete(handlers::delete_user::<R, T>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity::<R, T>,
        ))
        .with_state(state)
}

/// API-key authenticated routes; mount under `/api`.
pub fn api_router<R, T>(state: AuthAppState<R, T>) -> Router
where
    R: AuthStore,
    T: OAuthTransport + Sync + 'static,
{
    Router::new()
        .route("/v1/me", get(handlers::me::<R, T>))
        .layer(middleware::from_fn_with_state(state.clone(), api_auth::<R, T>))
        .with_state(state)
}
