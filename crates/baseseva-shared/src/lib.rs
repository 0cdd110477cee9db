//! # baseseva-shared
//!
//! Types shared by the BaseSeva client and server: domain records, wire
//! payloads, the `{ success, data, error }` response envelope, certificate
//! upload rules and the keypair wallet used for sign-in.

pub mod constants;
pub mod envelope;
pub mod error;
pub mod geo;
pub mod models;
pub mod types;
pub mod upload;
pub mod wallet;

pub use envelope::ApiResponse;
pub use models::*;
pub use types::*;
