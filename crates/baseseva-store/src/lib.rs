//! # baseseva-store
//!
//! SQLite storage for BaseSeva, backed by rusqlite.
//!
//! The same `Database` handle serves two roles: on the client it backs the
//! persistent key/value [`LocalStore`] that survives restarts; on the server
//! it holds the users, requests, donations, blood banks, notifications and
//! certificate tables, each with typed CRUD helpers.

pub mod banks;
pub mod certificates;
pub mod database;
pub mod donations;
pub mod kv;
pub mod migrations;
pub mod notifications;
pub mod requests;
pub mod users;

mod error;
mod rows;

pub use certificates::CertificateRecord;
pub use database::Database;
pub use error::{Result, StoreError};
pub use kv::{LocalStore, MemoryStore, SqliteStore};
