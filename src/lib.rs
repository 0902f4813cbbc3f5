//! Wallet Report Worker Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod config;
pub mod report;
pub mod server;
pub mod sqlite_persistence;
pub mod wallet_store;

// Re-export commonly used types for convenience
pub use background_jobs::{JobContext, JobScheduler};
pub use report::{CsvReportWriter, ReportWriter};
pub use wallet_store::{SqliteWalletStore, WalletStore};
