//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request errors render through `auth::AuthError`.

use std::env;
use std::net::SocketAddr;

use anyhow::Context;
use auth::config::SameSite;
use auth::{
    AuthAppState, AuthConfig, OAuthConfig, PgAuthRepository, ReqwestTransport, api_router,
    auth_router,
};
use axum::{
    Router, http,
    http::{HeaderName, Method, header},
};
use platform::crypto::from_base64;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:31113";

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// `AUTH_CONTEXT_SECRET` is required outside debug builds.
fn load_auth_config() -> anyhow::Result<AuthConfig> {
    let mut config = match env::var("AUTH_CONTEXT_SECRET") {
        Ok(secret_b64) => {
            let secret_bytes =
                from_base64(&secret_b64).context("AUTH_CONTEXT_SECRET is not valid base64")?;
            let secret: [u8; 32] = secret_bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("AUTH_CONTEXT_SECRET must decode to 32 bytes"))?;
            let base = if cfg!(debug_assertions) {
                AuthConfig::development()
            } else {
                AuthConfig::default()
            };
            AuthConfig {
                context_secret: secret,
                ..base
            }
        }
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!("AUTH_CONTEXT_SECRET not set, using a random development secret");
            AuthConfig::development()
        }
        Err(_) => anyhow::bail!("AUTH_CONTEXT_SECRET must be set in production"),
    };

    if env_flag("APP_DEBUG") {
        config.debug_errors = true;
    }
    // Only behind a reverse proxy that overwrites X-Forwarded-For
    config.trust_forwarded_headers = env_flag("TRUST_FORWARDED_HEADERS");
    if let Ok(same_site) = env::var("COOKIE_SAME_SITE") {
        config.cookie_same_site = SameSite::parse(&same_site);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "blufox_api=info,auth=info,platform=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Identity provider; missing credentials abort startup
    let oauth = OAuthConfig::from_parts(
        env::var("OAUTH_CLIENT_ID").ok(),
        env::var("OAUTH_CLIENT_SECRET").ok(),
        env::var("OAUTH_REDIRECT_URI").ok(),
    )?;
    let transport = ReqwestTransport::new(&oauth)?;
    let auth_config = load_auth_config()?;

    // Database connection
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let state = AuthAppState::new(
        PgAuthRepository::new(pool),
        transport,
        auth_config,
        oauth,
    );

    // Startup cleanup; errors here should not prevent server startup
    if let Err(e) = state.housekeeping().run().await {
        tracing::warn!(error = %e, "Auth cleanup failed, continuing anyway");
    }

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-api-key"),
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/auth", auth_router(state.clone()))
        .nest("/api", api_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
