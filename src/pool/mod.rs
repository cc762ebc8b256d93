//! Provisioning on top of a credential store: configuration, fallback
//! generation, and the allocate-or-generate flow used by test setup.

pub mod config;
pub mod generator;
pub mod provision;

pub use config::PoolConfig;
pub use generator::CredentialGenerator;
pub use provision::{CredentialSource, Provisioned, acquire};
