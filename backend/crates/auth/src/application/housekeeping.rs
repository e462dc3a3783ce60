//! Housekeeping
//!
//! Opportunistic purge of expired rows, triggered by a small fraction of
//! requests. Nothing depends on it for correctness: expired rows are rejected
//! on read regardless.

use std::sync::Arc;

use platform::clock::Clock;
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::domain::repository::MaintenanceRepository;
use crate::error::AuthResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub sessions: u64,
    pub api_keys: u64,
    pub csrf_tokens: u64,
    pub oauth_states: u64,
    pub rate_limit_windows: u64,
}

pub struct Housekeeping<R>
where
    R: MaintenanceRepository + RateLimitStore,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R> Housekeeping<R>
where
    R: MaintenanceRepository + RateLimitStore,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    pub async fn run(&self) -> AuthResult<HousekeepingReport> {
        let now = self.clock.now();
        let longest_window = self
            .config
            .api_rate_limit
            .window_ms()
            .max(self.config.api_key_rate_limit.window_ms());

        let report = HousekeepingReport {
            sessions: self.repo.purge_expired_sessions(now).await?,
            api_keys: self.repo.purge_expired_api_keys(now).await?,
            csrf_tokens: self
                .repo
                .purge_stale_csrf_tokens(now - self.config.csrf_ttl())
                .await?,
            oauth_states: self.repo.purge_expired_oauth_states(now).await?,
            rate_limit_windows: self
                .repo
                .purge_stale(now.timestamp_millis() - longest_window)
                .await?,
        };

        tracing::info!(
            sessions = report.sessions,
            api_keys = report.api_keys,
            csrf_tokens = report.csrf_tokens,
            oauth_states = report.oauth_states,
            rate_limit_windows = report.rate_limit_windows,
            "Housekeeping completed"
        );

        Ok(report)
    }

    /// Run with the given probability. Failures are logged, never returned.
    pub async fn maybe_run(&self, probability: f64) -> Option<HousekeepingReport> {
        if !(rand::random::<f64>() < probability) {
            return None;
        }
        match self.run().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "Housekeeping failed");
                None
            }
        }
    }
}
