//! Persisted ledger of installed resources.

pub mod store;
pub mod types;

pub use store::LockManager;
pub use types::{LOCKFILE_VERSION, LockEntry, Lockfile, Provenance};
