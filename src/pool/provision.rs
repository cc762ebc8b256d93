use serde::{Deserialize, Serialize};

use super::generator::CredentialGenerator;
use crate::store::{Credential, CredentialStore, Result};

/// Where a provisioned credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// Recycled from the pool; the account already exists
    Pool,
    /// Freshly generated; the caller must register the account
    Generated,
}

/// Identity handed to a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provisioned {
    #[serde(flatten)]
    pub credential: Credential,
    pub source: CredentialSource,
}

/// Take a credential from `store`, falling back to `generator` when the pool
/// is missing, empty or exhausted.
///
/// With `record_fresh`, a generated credential is appended to the pool so a
/// later run can reuse the account. Any other store failure propagates.
pub fn acquire<S>(store: &S, generator: &CredentialGenerator, record_fresh: bool) -> Result<Provisioned>
where
    S: CredentialStore + ?Sized,
{
    match store.allocate_next() {
        Ok(credential) => Ok(Provisioned {
            credential,
            source: CredentialSource::Pool,
        }),
        Err(e) if e.is_recoverable() => {
            tracing::info!(reason = e.kind(), "pool cannot supply a credential, generating one");
            let credential = generator.generate();
            if record_fresh {
                store.append(&credential)?;
            }
            Ok(Provisioned {
                credential,
                source: CredentialSource::Generated,
            })
        }
        Err(e) => Err(e),
    }
}
