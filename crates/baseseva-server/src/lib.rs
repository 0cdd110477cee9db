//! # baseseva-server
//!
//! REST backend for BaseSeva.
//!
//! - **Auth/profile**: login upserts donors by wallet address
//! - **Blood requests**: active, unexpired requests; critical ones alert
//!   matching donors in the same city
//! - **Donations, blood banks, notifications**: CRUD over SQLite
//! - **Certificates**: validated image uploads kept on local disk
//! - **Minting**: a simulated certificate mint behind [`minter::CertificateMinter`]
//!
//! Every response body is an `ApiResponse` envelope.

pub mod api;
pub mod certificate_store;
pub mod config;
pub mod error;
pub mod minter;
pub mod seed;

use std::sync::Arc;

use baseseva_store::Database;
use tokio::sync::Mutex;

pub use api::{build_router, serve, serve_listener, AppState};
pub use config::ServerConfig;
pub use error::ServerError;

use crate::certificate_store::CertificateStore;
use crate::minter::SimulatedMinter;

/// Open the database, seed it if configured, and prepare certificate storage.
pub async fn build_state(config: ServerConfig) -> Result<AppState, ServerError> {
    let db = Database::open_at(&config.database_path)?;
    if config.seed_blood_banks {
        seed::seed_blood_banks(&db)?;
    }

    let certificates = CertificateStore::new(config.certificate_storage_path.clone()).await?;
    let minter = SimulatedMinter::new(config.mint_network.clone());

    Ok(AppState {
        db: Arc::new(Mutex::new(db)),
        certificates: Arc::new(certificates),
        minter: Arc::new(minter),
        config: Arc::new(config),
    })
}
