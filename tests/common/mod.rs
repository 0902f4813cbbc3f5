//! Common test infrastructure
//!
//! `TestWorker` wires a real SQLite wallet database and CSV report writer in
//! a temporary directory, the same way the worker binary does.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestWorker;
//!
//! #[test]
//! fn test_export() {
//!     let worker = TestWorker::new();
//!     let user_id = worker.user_with_request("alice");
//!     worker.dispatch(user_id);
//!     assert!(worker.report(user_id).starts_with("time,type,sats\n"));
//! }
//! ```

mod fixtures;

pub use fixtures::TestWorker;
