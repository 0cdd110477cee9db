//! # baseseva-client
//!
//! Data and sync layer of the BaseSeva app.
//!
//! - [`gateway`]: one call per backend operation, always resolving to an
//!   `ApiResponse`
//! - [`context`]: the session/cache container with write-through persistence
//! - [`watchers`]: connectivity, geolocation and notification permission
//! - [`sync`]: the periodic synchronizer
//! - [`auth`]: mock and keypair wallet providers

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod gateway;
pub mod state;
pub mod sync;
pub mod watchers;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use baseseva_store::LocalStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub use auth::AuthProvider;
pub use config::ClientConfig;
pub use context::{DataContext, SyncOutcome};
pub use error::ClientError;
pub use gateway::{Gateway, HttpGateway};

use crate::watchers::{ConnectivityEvent, Platform};

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("baseseva_client=debug,baseseva_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// A running client: the container plus its background tasks.
pub struct BaseSeva {
    pub context: Arc<DataContext>,
    pub auth: Arc<dyn AuthProvider>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl BaseSeva {
    /// Start against the backend named in `config`.
    pub async fn start(
        config: ClientConfig,
        store: Arc<dyn LocalStore>,
        platform: Arc<dyn Platform>,
        connectivity: mpsc::Receiver<ConnectivityEvent>,
    ) -> Result<Self, ClientError> {
        let gateway = HttpGateway::new(&config.api_url, config.request_timeout)?;
        Self::start_with_gateway(config, Arc::new(gateway), store, platform, connectivity).await
    }

    pub async fn start_with_gateway(
        config: ClientConfig,
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn LocalStore>,
        platform: Arc<dyn Platform>,
        connectivity: mpsc::Receiver<ConnectivityEvent>,
    ) -> Result<Self, ClientError> {
        let auth = auth::from_config(&config)?;
        let context = Arc::new(DataContext::new(gateway, store));
        watchers::initialize(&context, platform.as_ref()).await;

        let cancel = CancellationToken::new();
        let tasks = vec![
            watchers::spawn_connectivity_watcher(
                context.clone(),
                platform,
                connectivity,
                cancel.clone(),
            ),
            sync::spawn_periodic_sync(context.clone(), config.sync_interval, cancel.clone()),
        ];

        info!(api = %config.api_url, auth = auth.name(), "BaseSeva client started");
        Ok(Self {
            context,
            auth,
            cancel,
            tasks,
        })
    }

    /// No stored session and no connected wallet.
    pub fn needs_login(&self) -> bool {
        !self.context.has_session() && !self.auth.is_connected()
    }

    pub async fn login(&self) -> bool {
        self.context.login_with(self.auth.as_ref(), None).await
    }

    pub async fn logout(&self) {
        self.context.logout(self.auth.as_ref()).await;
    }

    /// Stop the background tasks and wait for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        info!("BaseSeva client stopped");
    }
}

#[cfg(test)]
mod tests {
    use baseseva_store::MemoryStore;

    use super::*;
    use crate::testing::{FakeGateway, FakePlatform};

    #[tokio::test]
    async fn test_start_login_logout() {
        let (_tx, rx) = mpsc::channel(1);
        let app = BaseSeva::start_with_gateway(
            ClientConfig::default(),
            Arc::new(FakeGateway::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(FakePlatform::default()),
            rx,
        )
        .await
        .unwrap();

        assert!(app.needs_login());
        assert_eq!(
            app.context.app_data().location_permission,
            baseseva_shared::LocationPermission::Granted
        );

        assert!(app.login().await);
        assert!(!app.needs_login());

        app.logout().await;
        assert!(app.needs_login());
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_rejects_bad_url() {
        let (_tx, rx) = mpsc::channel(1);
        let config = ClientConfig {
            api_url: "nope".into(),
            ..ClientConfig::default()
        };
        let result = BaseSeva::start(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(FakePlatform::default()),
            rx,
        )
        .await;
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
