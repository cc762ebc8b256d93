use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::generator::CredentialGenerator;
use crate::store::{CsvCredentialStore, DEFAULT_POOL_PATH, LockOptions, MalformedPolicy};

/// Settings shared by every pool command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool file, relative paths resolve against the working directory
    pub path: PathBuf,
    /// How long to wait for another process to release the pool
    pub lock_timeout_ms: u64,
    /// Pause between lock attempts
    pub lock_retry_interval_ms: u64,
    pub malformed_policy: MalformedPolicy,
    /// Domain used for generated email addresses
    pub email_domain: String,
    pub password_length: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_POOL_PATH),
            lock_timeout_ms: 10_000,
            lock_retry_interval_ms: 25,
            malformed_policy: MalformedPolicy::Skip,
            email_domain: "example.test".to_string(),
            password_length: 12,
        }
    }
}

impl PoolConfig {
    /// Load configuration, then apply environment overrides.
    ///
    /// An explicit path must exist. Without one, the per-user config file is
    /// used when present and defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::read_from(path)?,
            None => match Self::config_file_path() {
                Ok(path) if path.exists() => Self::read_from(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Save configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Per-user configuration file location
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else if let Some(dir) = dirs::config_dir() {
            dir
        } else {
            return Err(anyhow!("Cannot determine config directory"));
        };

        Ok(config_dir.join("credpool").join("config.json"))
    }

    /// Apply `CREDPOOL_*` overrides looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("CREDPOOL_PATH").filter(|p| !p.is_empty()) {
            self.path = PathBuf::from(path);
        }
        if let Some(timeout) = lookup("CREDPOOL_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("CREDPOOL_LOCK_TIMEOUT_MS must be a number, got '{}'", timeout))?;
        }
        if let Some(policy) = lookup("CREDPOOL_MALFORMED") {
            self.malformed_policy = match policy.trim().to_lowercase().as_str() {
                "skip" => MalformedPolicy::Skip,
                "reject" => MalformedPolicy::Reject,
                other => return Err(anyhow!("CREDPOOL_MALFORMED must be skip or reject, got '{}'", other)),
            };
        }
        Ok(())
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(self.lock_timeout_ms),
            retry_interval: Duration::from_millis(self.lock_retry_interval_ms.max(1)),
        }
    }

    /// Build the file store described by this configuration
    pub fn open_store(&self) -> CsvCredentialStore {
        CsvCredentialStore::new(&self.path)
            .with_lock_options(self.lock_options())
            .with_malformed_policy(self.malformed_policy)
    }

    pub fn generator(&self) -> CredentialGenerator {
        CredentialGenerator::new(&self.email_domain, self.password_length)
    }

    /// Problems worth telling the user about; never fatal
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.lock_timeout_ms == 0 {
            warnings.push("lock_timeout_ms is 0: contended operations fail immediately".to_string());
        }
        if self.lock_retry_interval_ms > self.lock_timeout_ms {
            warnings.push("lock_retry_interval_ms exceeds lock_timeout_ms: only one retry will happen".to_string());
        }
        if self.password_length < 4 {
            warnings.push(format!(
                "password_length {} is below 4, generated passwords use 4",
                self.password_length
            ));
        }
        if self.email_domain.trim().is_empty() || self.email_domain.contains('@') {
            warnings.push(format!("email_domain '{}' is not a bare domain", self.email_domain));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.path, PathBuf::from("data/created_users.csv"));
        assert_eq!(config.malformed_policy, MalformedPolicy::Skip);
        assert_eq!(config.password_length, 12);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "path": "pool/users.csv", "malformed_policy": "reject" }"#).unwrap();

        let config = PoolConfig::read_from(&path).unwrap();
        assert_eq!(config.path, PathBuf::from("pool/users.csv"));
        assert_eq!(config.malformed_policy, MalformedPolicy::Reject);
        assert_eq!(config.lock_timeout_ms, 10_000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = PoolConfig::default();
        config.email_domain = "qa.example".to_string();
        config.save(&path).unwrap();

        assert_eq!(PoolConfig::read_from(&path).unwrap(), config);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(PoolConfig::load(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PoolConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("CREDPOOL_PATH", "/tmp/pool.csv"),
                ("CREDPOOL_LOCK_TIMEOUT_MS", " 250 "),
                ("CREDPOOL_MALFORMED", "Reject"),
            ]))
            .unwrap();

        assert_eq!(config.path, PathBuf::from("/tmp/pool.csv"));
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.malformed_policy, MalformedPolicy::Reject);
        assert_eq!(config.lock_options().timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_env_values_rejected() {
        let mut config = PoolConfig::default();
        assert!(config.apply_overrides(lookup_from(&[("CREDPOOL_LOCK_TIMEOUT_MS", "soon")])).is_err());
        assert!(config.apply_overrides(lookup_from(&[("CREDPOOL_MALFORMED", "ignore")])).is_err());
    }

    #[test]
    fn test_validation_warnings() {
        let mut config = PoolConfig::default();
        config.lock_retry_interval_ms = 20_000;
        config.password_length = 2;
        config.email_domain = "@bad".to_string();

        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("lock_retry_interval_ms")));
    }
}
