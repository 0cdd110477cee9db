//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use baseseva_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./baseseva.db`
    pub database_path: PathBuf,

    /// Directory where uploaded certificate images are written.
    /// Env: `CERTIFICATE_STORAGE_PATH`
    /// Default: `./certificates`
    pub certificate_storage_path: PathBuf,

    /// Base of the public URLs handed out for stored certificates, without a
    /// trailing slash.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Network name stamped on mint receipts.
    /// Env: `MINT_NETWORK`
    /// Default: `simulated`
    pub mint_network: String,

    /// Insert the demo blood bank directory when the table is empty.
    /// Env: `SEED_BLOOD_BANKS` (true/false)
    /// Default: `true`
    pub seed_blood_banks: bool,

    /// Origins allowed by CORS. Empty means any origin.
    /// Env: `CORS_ALLOWED_ORIGINS` (comma separated)
    /// Default: empty
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./baseseva.db"),
            certificate_storage_path: PathBuf::from("./certificates"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            mint_network: "simulated".to_string(),
            seed_blood_banks: true,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("CERTIFICATE_STORAGE_PATH").filter(|p| !p.is_empty()) {
            config.certificate_storage_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            let url = url.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                config.public_base_url = url.to_string();
            } else {
                tracing::warn!(value = %url, "Invalid PUBLIC_BASE_URL, using default");
            }
        }

        if let Some(network) = lookup("MINT_NETWORK").filter(|n| !n.trim().is_empty()) {
            config.mint_network = network.trim().to_string();
        }

        if let Some(val) = lookup("SEED_BLOOD_BANKS") {
            config.seed_blood_banks = val != "false" && val != "0";
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty() && *o != "*")
                .map(String::from)
                .collect();
        }

        config
    }

    /// Public URL under which a stored certificate is served.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/files/{}", self.public_base_url, file_name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.mint_network, "simulated");
        assert!(config.seed_blood_banks);
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("PUBLIC_BASE_URL", "ftp://files"),
        ]));
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
        assert_eq!(config.public_base_url, "http://localhost:8080");
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("PUBLIC_BASE_URL", "https://api.baseseva.org/"),
            ("SEED_BLOOD_BANKS", "0"),
            ("CORS_ALLOWED_ORIGINS", "https://app.baseseva.org, *,"),
        ]));
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(
            config.public_url("a.png"),
            "https://api.baseseva.org/files/a.png"
        );
        assert!(!config.seed_blood_banks);
        assert_eq!(config.cors_allowed_origins, vec!["https://app.baseseva.org"]);
    }
}
