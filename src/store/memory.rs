use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use super::CredentialStore;
use super::error::{Result, StoreError};
use super::record::{Credential, CredentialRecord, PoolStats, Status};

/// In-process credential pool with the same contract as the file store
///
/// Nothing survives the process. Useful for suites that provision within a
/// single run, and for exercising code written against [`CredentialStore`].
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: Mutex<Vec<CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the pool with existing records, in order
    pub fn with_records(records: Vec<CredentialRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn records(&self) -> MutexGuard<'_, Vec<CredentialRecord>> {
        // Every mutation is a single push or field store, so poisoning is harmless
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn label() -> PathBuf {
        PathBuf::from("<memory>")
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn append(&self, credential: &Credential) -> Result<()> {
        self.records()
            .push(credential.clone().with_status(Status::Unused));
        tracing::debug!(email = %credential.email, "credential added to in-memory pool");
        Ok(())
    }

    fn allocate_next(&self) -> Result<Credential> {
        let mut records = self.records();
        if records.is_empty() {
            return Err(StoreError::PoolEmpty { path: Self::label() });
        }

        let total = records.len();
        let record = records
            .iter_mut()
            .find(|record| record.status.is_unused())
            .ok_or_else(|| StoreError::Exhausted {
                path: Self::label(),
                total,
            })?;

        record.status = Status::Used;
        Ok(record.credential())
    }

    fn read_all(&self) -> Result<Vec<CredentialRecord>> {
        Ok(self.records().clone())
    }

    fn stats(&self) -> Result<PoolStats> {
        Ok(PoolStats::from_records(self.records().iter()))
    }
}
