//! Client configuration loaded from environment variables.
//!
//! Missing or invalid values fall back to the local development defaults:
//! mock sign-in against a backend on localhost.

use std::path::PathBuf;
use std::time::Duration;

use baseseva_shared::constants::{DEFAULT_HTTP_PORT, SYNC_INTERVAL_SECS};

/// Which [`AuthProvider`](crate::auth::AuthProvider) the client signs in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Deterministic wallet derived from a seed. Demo and test use only.
    #[default]
    Mock,
    /// Ed25519 keypair persisted on disk.
    Keypair,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL.
    /// Env: `BASESEVA_API_URL`
    /// Default: `http://localhost:8080`
    pub api_url: String,

    /// Env: `BASESEVA_AUTH_MODE` (`mock` | `keypair`)
    /// Default: `mock`
    pub auth_mode: AuthMode,

    /// Seed for the mock wallet.
    /// Env: `BASESEVA_MOCK_SEED`
    /// Default: `baseseva-demo`
    pub mock_seed: String,

    /// Key file for the keypair wallet. `None` uses the platform data
    /// directory.
    /// Env: `BASESEVA_WALLET_KEY_PATH`
    pub wallet_key_path: Option<PathBuf>,

    /// Env: `BASESEVA_SYNC_INTERVAL_SECS`
    /// Default: 300
    pub sync_interval: Duration,

    /// Transport timeout for every backend call.
    /// Env: `BASESEVA_REQUEST_TIMEOUT_SECS`
    /// Default: 15
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            auth_mode: AuthMode::Mock,
            mock_seed: "baseseva-demo".to_string(),
            wallet_key_path: None,
            sync_interval: Duration::from_secs(SYNC_INTERVAL_SECS),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("BASESEVA_API_URL") {
            let url = url.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                config.api_url = url.to_string();
            } else {
                tracing::warn!(value = %url, "Invalid BASESEVA_API_URL, using default");
            }
        }

        if let Some(mode) = lookup("BASESEVA_AUTH_MODE") {
            match mode.trim().to_ascii_lowercase().as_str() {
                "mock" => config.auth_mode = AuthMode::Mock,
                "keypair" => config.auth_mode = AuthMode::Keypair,
                other => {
                    tracing::warn!(value = %other, "Unknown BASESEVA_AUTH_MODE, using mock")
                }
            }
        }

        if let Some(seed) = lookup("BASESEVA_MOCK_SEED").filter(|s| !s.is_empty()) {
            config.mock_seed = seed;
        }

        if let Some(path) = lookup("BASESEVA_WALLET_KEY_PATH").filter(|p| !p.is_empty()) {
            config.wallet_key_path = Some(PathBuf::from(path));
        }

        if let Some(secs) = parse_secs(&lookup, "BASESEVA_SYNC_INTERVAL_SECS") {
            config.sync_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_secs(&lookup, "BASESEVA_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid duration, using default");
            None
        }
    }
}
