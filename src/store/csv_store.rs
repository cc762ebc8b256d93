use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::CredentialStore;
use super::codec::{self, Document, HEADER};
use super::error::{Result, StoreError};
use super::lock::{self, LockGuard, LockOptions};
use super::record::{Credential, CredentialRecord, PoolStats, Status};

/// Default location of the pool, relative to the working directory
pub const DEFAULT_POOL_PATH: &str = "data/created_users.csv";

/// What to do with data lines that cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log a warning, leave the line untouched in the file
    #[default]
    Skip,
    /// Fail the operation
    Reject,
}

/// Credential pool persisted as a CSV file
///
/// Every operation re-reads the file; nothing is cached between calls.
/// Mutations happen while holding the sibling lock file, and whole-file
/// rewrites go through a temporary file that is renamed over the original.
#[derive(Debug, Clone)]
pub struct CsvCredentialStore {
    path: PathBuf,
    lock_options: LockOptions,
    malformed_policy: MalformedPolicy,
}

impl CsvCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_options: LockOptions::default(),
            malformed_policy: MalformedPolicy::default(),
        }
    }

    pub fn with_lock_options(mut self, lock_options: LockOptions) -> Self {
        self.lock_options = lock_options;
        self
    }

    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<LockGuard> {
        lock::acquire(&self.path, &self.lock_options)
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Read and parse the file. Must be called with the lock held.
    fn load(&self, _guard: &LockGuard) -> Result<Option<Document>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(codec::parse_document(&content))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn check_malformed(&self, document: &Document) -> Result<()> {
        match document.header.as_deref() {
            None => tracing::warn!(path = %self.path.display(), "pool file has no header row"),
            Some(header) if !document.header_matches() => {
                tracing::warn!(path = %self.path.display(), header, "unexpected header row")
            }
            Some(_) => {}
        }

        for (line, content) in document.malformed() {
            match self.malformed_policy {
                MalformedPolicy::Skip => {
                    tracing::warn!(path = %self.path.display(), line, "skipping malformed record");
                }
                MalformedPolicy::Reject => {
                    return Err(StoreError::Malformed {
                        line,
                        content: content.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Replace the file contents via temp file + fsync + rename
    fn write_atomic(&self, content: &str, _guard: &LockGuard) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "pool".to_string());
        let temp_path = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }

        sync_parent_dir(&self.path);
        Ok(())
    }
}

impl CredentialStore for CsvCredentialStore {
    fn append(&self, credential: &Credential) -> Result<()> {
        validate_field("name", &credential.name)?;
        validate_field("email", &credential.email)?;
        validate_field("password", &credential.password)?;

        self.ensure_parent_dir()?;
        let _guard = self.lock()?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let row = codec::format_record(&credential.clone().with_status(Status::Unused));
        let chunk = if needs_header {
            format!("{}\n{}", HEADER, row)
        } else {
            row
        };
        file.write_all(chunk.as_bytes())?;
        file.sync_all()?;

        if needs_header {
            tracing::info!(path = %self.path.display(), "created credential file");
        }
        tracing::info!(path = %self.path.display(), email = %credential.email, "credential added to pool");
        Ok(())
    }

    fn allocate_next(&self) -> Result<Credential> {
        if !self.path.exists() {
            return Err(StoreError::NotFound {
                path: self.path.clone(),
            });
        }

        let guard = self.lock()?;
        let mut document = self.load(&guard)?.ok_or_else(|| StoreError::NotFound {
            path: self.path.clone(),
        })?;

        if document.rows.is_empty() {
            return Err(StoreError::PoolEmpty {
                path: self.path.clone(),
            });
        }
        self.check_malformed(&document)?;

        let Some(credential) = document.take_first_unused() else {
            return Err(StoreError::Exhausted {
                path: self.path.clone(),
                total: document.records().count(),
            });
        };

        self.write_atomic(&codec::render_document(&document.rows), &guard)?;
        tracing::info!(path = %self.path.display(), email = %credential.email, "credential allocated");

        Ok(credential)
    }

    fn read_all(&self) -> Result<Vec<CredentialRecord>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "credential file does not exist yet");
            return Ok(Vec::new());
        }

        let guard = self.lock()?;
        let Some(document) = self.load(&guard)? else {
            return Ok(Vec::new());
        };
        self.check_malformed(&document)?;

        Ok(document.records().cloned().collect())
    }

    fn stats(&self) -> Result<PoolStats> {
        if !self.path.exists() {
            return Ok(PoolStats::default());
        }

        let guard = self.lock()?;
        let Some(document) = self.load(&guard)? else {
            return Ok(PoolStats::default());
        };

        let mut stats = PoolStats::from_records(document.records());
        stats.malformed = document.malformed().count();
        Ok(stats)
    }
}

fn validate_field(field: &'static str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(StoreError::InvalidField { field });
    }
    Ok(())
}

/// Persist the rename itself; best effort
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let Ok(dir) = File::open(parent) {
            if let Err(e) = dir.sync_all() {
                tracing::debug!(dir = %parent.display(), error = %e, "directory fsync failed");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
