//! Wallet sign-in providers.
//!
//! [`MockAuthProvider`] derives a fixed wallet from a seed and is only for
//! demos and tests. [`KeypairAuthProvider`] keeps a real Ed25519 key on
//! disk. Which one runs is decided by [`AuthMode`], never by probing for
//! missing keys.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use baseseva_shared::error::WalletError;
use baseseva_shared::wallet::Wallet;
use directories::ProjectDirs;
use ed25519_dalek::Signature;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AuthMode, ClientConfig};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Key file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot determine a data directory for the wallet key")]
    NoDataDir,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Connect the wallet and return its address.
    async fn connect(&self) -> Result<String, AuthError>;

    async fn disconnect(&self);

    /// Address of the connected wallet, if any.
    fn address(&self) -> Option<String>;

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }
}

/// Deterministic wallet derived from a seed string.
pub struct MockAuthProvider {
    wallet: Wallet,
    connected: AtomicBool,
}

impl MockAuthProvider {
    pub fn new(seed: &str) -> Self {
        Self {
            wallet: Wallet::from_seed(seed),
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self) -> Result<String, AuthError> {
        self.connected.store(true, Ordering::SeqCst);
        let address = self.wallet.address();
        debug!(%address, "Mock wallet connected");
        Ok(address)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn address(&self) -> Option<String> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.wallet.address())
    }
}

/// Ed25519 wallet whose secret key lives hex-encoded in a file. The key is
/// generated on first connect.
pub struct KeypairAuthProvider {
    key_path: PathBuf,
    wallet: Mutex<Option<Wallet>>,
}

impl KeypairAuthProvider {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            wallet: Mutex::new(None),
        }
    }

    /// Key file in the platform data directory.
    pub fn default_key_path() -> Result<PathBuf, AuthError> {
        let dirs = ProjectDirs::from("org", "baseseva", "BaseSeva").ok_or(AuthError::NoDataDir)?;
        Ok(dirs.data_dir().join("wallet.key"))
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Sign with the connected wallet.
    pub fn sign(&self, message: &[u8]) -> Option<Signature> {
        self.current().map(|wallet| wallet.sign(message))
    }

    fn current(&self) -> Option<Wallet> {
        match self.wallet.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_current(&self, wallet: Option<Wallet>) {
        match self.wallet.lock() {
            Ok(mut guard) => *guard = wallet,
            Err(poisoned) => *poisoned.into_inner() = wallet,
        }
    }

    fn load_or_create(&self) -> Result<Wallet, AuthError> {
        if self.key_path.exists() {
            let hex_key = std::fs::read_to_string(&self.key_path)?;
            let wallet = Wallet::from_secret_hex(&hex_key)?;
            debug!(path = %self.key_path.display(), "Loaded wallet key");
            return Ok(wallet);
        }

        if let Some(parent) = self.key_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let wallet = Wallet::generate();
        std::fs::write(&self.key_path, wallet.secret_hex())?;
        restrict_permissions(&self.key_path)?;
        info!(path = %self.key_path.display(), address = %wallet.address(), "Generated new wallet key");
        Ok(wallet)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl AuthProvider for KeypairAuthProvider {
    fn name(&self) -> &'static str {
        "keypair"
    }

    async fn connect(&self) -> Result<String, AuthError> {
        if let Some(wallet) = self.current() {
            return Ok(wallet.address());
        }
        let wallet = self.load_or_create()?;
        let address = wallet.address();
        self.set_current(Some(wallet));
        Ok(address)
    }

    async fn disconnect(&self) {
        self.set_current(None);
    }

    fn address(&self) -> Option<String> {
        self.current().map(|wallet| wallet.address())
    }
}

/// Build the provider selected by `config.auth_mode`.
pub fn from_config(config: &ClientConfig) -> Result<Arc<dyn AuthProvider>, AuthError> {
    let provider: Arc<dyn AuthProvider> = match config.auth_mode {
        AuthMode::Mock => Arc::new(MockAuthProvider::new(&config.mock_seed)),
        AuthMode::Keypair => {
            let path = match &config.wallet_key_path {
                Some(path) => path.clone(),
                None => KeypairAuthProvider::default_key_path()?,
            };
            Arc::new(KeypairAuthProvider::new(path))
        }
    };
    info!(provider = provider.name(), "Auth provider selected");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use baseseva_shared::wallet::{is_valid_address, verify_signature};

    #[tokio::test]
    async fn test_mock_provider_is_deterministic() {
        let a = MockAuthProvider::new("donor");
        let b = MockAuthProvider::new("donor");
        assert!(!a.is_connected());

        let address = a.connect().await.unwrap();
        assert!(is_valid_address(&address));
        assert_eq!(address, b.connect().await.unwrap());
        assert_eq!(a.address(), Some(address));

        a.disconnect().await;
        assert_eq!(a.address(), None);
    }

    #[tokio::test]
    async fn test_keypair_provider_persists_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wallet.key");

        let first = KeypairAuthProvider::new(&path);
        let address = first.connect().await.unwrap();
        assert!(path.exists());

        let signature = first.sign(b"hello").unwrap();
        let hex_key = std::fs::read_to_string(&path).unwrap();
        let wallet = Wallet::from_secret_hex(&hex_key).unwrap();
        assert!(verify_signature(&wallet.public_key_bytes(), b"hello", &signature).is_ok());

        first.disconnect().await;
        assert!(first.sign(b"hello").is_none());

        let second = KeypairAuthProvider::new(&path);
        assert_eq!(second.connect().await.unwrap(), address);
    }

    #[tokio::test]
    async fn test_corrupt_key_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.key");
        std::fs::write(&path, "not hex").unwrap();

        let provider = KeypairAuthProvider::new(&path);
        assert!(matches!(
            provider.connect().await,
            Err(AuthError::Wallet(WalletError::InvalidKeyBytes))
        ));
        assert!(!provider.is_connected());
    }

    #[test]
    fn test_selection_follows_config() {
        let config = ClientConfig::default();
        assert_eq!(from_config(&config).unwrap().name(), "mock");

        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            auth_mode: AuthMode::Keypair,
            wallet_key_path: Some(dir.path().join("k")),
            ..ClientConfig::default()
        };
        assert_eq!(from_config(&config).unwrap().name(), "keypair");
    }
}
