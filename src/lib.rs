//! Reusable test-user credential pool
//!
//! [`store`] persists credentials and hands each one out at most once;
//! [`pool`] layers configuration and the allocate-or-generate flow on top.
//! Test suites can drive [`pool::acquire`] against any
//! [`store::CredentialStore`], including the in-memory one.

pub mod pool;
pub mod store;
