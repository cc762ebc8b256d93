//! Durable pool of reusable test-user credentials
//!
//! A test run that registered an account appends its credentials; a later
//! run allocates one instead of registering again. Allocation marks the
//! record used, and a used record is never handed out twice.

pub mod codec;
pub mod csv_store;
pub mod error;
pub mod lock;
pub mod memory;
pub mod record;

#[cfg(test)]
#[path = "csv_store.test.rs"]
mod csv_store_test;

pub use csv_store::{CsvCredentialStore, DEFAULT_POOL_PATH, MalformedPolicy};
pub use error::{Result, StoreError};
pub use lock::LockOptions;
pub use memory::MemoryCredentialStore;
pub use record::{Credential, CredentialRecord, PoolStats, Status};

/// Storage backend for a credential pool
pub trait CredentialStore: Send + Sync {
    /// Add a freshly created account as available for reuse
    fn append(&self, credential: &Credential) -> Result<()>;

    /// Claim the earliest unused credential, marking it used.
    ///
    /// Fails with [`StoreError::NotFound`], [`StoreError::PoolEmpty`] or
    /// [`StoreError::Exhausted`] when nothing can be handed out.
    fn allocate_next(&self) -> Result<Credential>;

    /// Every record with its status, in insertion order
    fn read_all(&self) -> Result<Vec<CredentialRecord>>;

    /// Row counts by status
    fn stats(&self) -> Result<PoolStats>;
}
