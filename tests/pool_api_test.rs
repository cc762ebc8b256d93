//! Library-level tests: test suites provisioning through an injected store

use credpool::pool::{CredentialGenerator, CredentialSource, PoolConfig, Provisioned, acquire};
use credpool::store::{
    Credential, CredentialRecord, CredentialStore, MemoryCredentialStore, Status, StoreError,
};
use std::sync::Arc;
use std::thread;

fn record(name: &str, email: &str, status: Status) -> CredentialRecord {
    Credential::new(name, email, "pw").with_status(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_behind_trait_object() {
        let store: Box<dyn CredentialStore> = Box::new(MemoryCredentialStore::with_records(vec![
            record("A", "a@x.com", Status::Used),
            record("B", "b@x.com", Status::Unused),
        ]));

        let provisioned: Provisioned = acquire(store.as_ref(), &CredentialGenerator::default(), false).unwrap();
        assert_eq!(provisioned.source, CredentialSource::Pool);
        assert_eq!(provisioned.credential.email, "b@x.com");

        let err = store.allocate_next().unwrap_err();
        assert!(matches!(err, StoreError::Exhausted { total: 2, .. }));
    }

    #[test]
    fn test_recorded_identity_is_reused_by_next_run() {
        let store = MemoryCredentialStore::new();
        let generator = PoolConfig::default().generator();

        let fresh = acquire(&store, &generator, true).unwrap();
        assert_eq!(fresh.source, CredentialSource::Generated);
        assert_eq!(store.stats().unwrap().unused, 1);

        let reused = acquire(&store, &generator, true).unwrap();
        assert_eq!(reused.source, CredentialSource::Pool);
        assert_eq!(reused.credential, fresh.credential);

        let next = acquire(&store, &generator, false).unwrap();
        assert_eq!(next.source, CredentialSource::Generated);
        assert_eq!(store.stats().unwrap().total, 1);
    }

    #[test]
    fn test_threads_share_one_memory_pool() {
        let store = Arc::new(MemoryCredentialStore::new());
        for i in 0..8 {
            store.append(&Credential::new("Worker", format!("w{i}@x.com"), "pw")).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.allocate_next().unwrap().email)
            })
            .collect();
        let mut emails: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        emails.sort();
        emails.dedup();

        assert_eq!(emails.len(), 8);
        assert_eq!(store.stats().unwrap().used, 8);
    }
}
