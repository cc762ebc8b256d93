use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Consumption marker of a pooled credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Available for allocation, stored as an empty token
    Unused,
    /// Handed out to a test run; terminal
    Used,
}

impl Status {
    /// Token written in the status column
    pub fn as_token(&self) -> &'static str {
        match self {
            Status::Unused => "",
            Status::Used => "used",
        }
    }

    /// Parse a raw status column. Surrounding whitespace is ignored.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "" => Some(Status::Unused),
            "used" => Some(Status::Used),
            _ => None,
        }
    }

    pub fn is_unused(&self) -> bool {
        matches!(self, Status::Unused)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unused => write!(f, "unused"),
            Status::Used => write!(f, "used"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    /// Parses the human-facing names used on the command line
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unused" | "available" => Ok(Status::Unused),
            "used" | "consumed" => Ok(Status::Used),
            other => Err(format!("unknown status '{}': expected unused or used", other)),
        }
    }
}

/// Login identity handed to a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Attach a status, producing the persisted form
    pub fn with_status(self, status: Status) -> CredentialRecord {
        CredentialRecord {
            name: self.name,
            email: self.email,
            password: self.password,
            status,
        }
    }
}

/// One row of the pool, including its consumption status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub name: String,
    pub email: String,
    pub password: String,
    pub status: Status,
}

impl CredentialRecord {
    /// Drop the status, keeping the login identity
    pub fn credential(&self) -> Credential {
        Credential::new(&self.name, &self.email, &self.password)
    }
}

impl From<CredentialRecord> for Credential {
    fn from(record: CredentialRecord) -> Self {
        Credential {
            name: record.name,
            email: record.email,
            password: record.password,
        }
    }
}

/// Row counts of a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub unused: usize,
    pub used: usize,
    pub malformed: usize,
}

impl PoolStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CredentialRecord>) -> Self {
        let mut stats = PoolStats::default();
        for record in records {
            stats.total += 1;
            match record.status {
                Status::Unused => stats.unused += 1,
                Status::Used => stats.used += 1,
            }
        }
        stats
    }
}
