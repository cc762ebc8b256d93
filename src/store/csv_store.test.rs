//! Unit tests for the file-backed credential store

use super::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

fn store_in(dir: &TempDir) -> CsvCredentialStore {
    CsvCredentialStore::new(dir.path().join("data").join("created_users.csv"))
}

fn write_pool(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}


#[cfg(test)]
mod allocate_tests {
    use super::*;

    #[test]
    fn test_scenario_append_then_allocate() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.append(&Credential::new("Alice", "a@x.com", "Pw1")).unwrap();
        let credential = store.allocate_next().unwrap();
        assert_eq!(credential, Credential::new("Alice", "a@x.com", "Pw1"));

        let records = store.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Status::Used);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let err = store.allocate_next().unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_header_only_is_pool_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        write_pool(store.path(), "name,email,password,status\n\n");

        let err = store.allocate_next().unwrap_err();
        assert!(matches!(err, StoreError::PoolEmpty { .. }));
    }

    #[test]
    fn test_headerless_file_keeps_every_record() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        write_pool(store.path(), "\"A\",\"a@x.com\",\"1\",\n\"B\",\"b@x.com\",\"2\",\n");

        assert_eq!(store.allocate_next().unwrap().email, "a@x.com");
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "name,email,password,status\n\"A\",\"a@x.com\",\"1\",used\n\"B\",\"b@x.com\",\"2\",\n"
        );
        assert_eq!(store.allocate_next().unwrap().email, "b@x.com");
        assert!(matches!(store.allocate_next().unwrap_err(), StoreError::Exhausted { total: 2, .. }));
    }

    #[test]
    fn test_all_used_is_exhausted() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        write_pool(
            store.path(),
            "name,email,password,status\n\"A\",\"a@x.com\",\"1\",used\n\"B\",\"b@x.com\",\"2\",used\n",
        );

        match store.allocate_next().unwrap_err() {
            StoreError::Exhausted { total, .. } => assert_eq!(total, 2),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_returns_earliest_unused_row() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        write_pool(
            store.path(),
            "name,email,password,status\n\"A\",\"a@x.com\",\"1\",used\n\"B\",\"b@x.com\",\"2\",\n\"C\",\"c@x.com\",\"3\",\n",
        );

        assert_eq!(store.allocate_next().unwrap().name, "B");

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            content,
            "name,email,password,status\n\"A\",\"a@x.com\",\"1\",used\n\"B\",\"b@x.com\",\"2\",used\n\"C\",\"c@x.com\",\"3\",\n"
        );
    }

    #[test]
    fn test_sequential_allocations_are_distinct_then_exhausted() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        write_pool(store.path(), "name,email,password,status\n\"U0\",\"u0@x.com\",\"0\",used\n");
        for i in 1..=4 {
            store
                .append(&Credential::new(format!("U{i}"), format!("u{i}@x.com"), i.to_string()))
                .unwrap();
        }

        let emails: Vec<String> = (0..4).map(|_| store.allocate_next().unwrap().email).collect();
        assert_eq!(emails, vec!["u1@x.com", "u2@x.com", "u3@x.com", "u4@x.com"]);
        assert!(matches!(
            store.allocate_next().unwrap_err(),
            StoreError::Exhausted { total: 5, .. }
        ));
    }

    #[test]
    fn test_status_survives_new_store_instance() {
        let dir = tempdir().unwrap();
        let first = store_in(&dir);
        first.append(&Credential::new("Alice", "a@x.com", "Pw1")).unwrap();
        first.append(&Credential::new("Bob", "b@x.com", "Pw2")).unwrap();
        first.allocate_next().unwrap();

        let reopened = store_in(&dir);
        let records = reopened.read_all().unwrap();
        assert_eq!(records[0].status, Status::Used);
        assert_eq!(records[1].status, Status::Unused);
        assert_eq!(reopened.allocate_next().unwrap().name, "Bob");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&Credential::new("Alice", "a@x.com", "Pw1")).unwrap();
        store.allocate_next().unwrap();

        let entries: Vec<String> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["created_users.csv".to_string()]);
    }

    #[test]
    fn test_held_lock_times_out() {
        let dir = tempdir().unwrap();
        let options = LockOptions {
            timeout: Duration::from_millis(100),
            retry_interval: Duration::from_millis(10),
        };
        let store = store_in(&dir).with_lock_options(options.clone());
        store.append(&Credential::new("Alice", "a@x.com", "Pw1")).unwrap();

        let _held = lock::acquire(store.path(), &options).unwrap();
        let err = store.allocate_next().unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
        assert!(!err.is_recoverable());

        drop(_held);
        assert_eq!(store.read_all().unwrap()[0].status, Status::Unused);
    }

    #[test]
    fn test_concurrent_threads_never_share_a_record() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        for i in 0..12 {
            store
                .append(&Credential::new(format!("User {i}"), format!("u{i}@x.com"), "pw"))
                .unwrap();
        }

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.allocate_next().unwrap().email)
            })
            .collect();

        let mut emails: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        emails.sort();
        emails.dedup();
        assert_eq!(emails.len(), 12);

        let stats = store.stats().unwrap();
        assert_eq!(stats.used, 12);
        assert_eq!(stats.unused, 0);
    }
}
