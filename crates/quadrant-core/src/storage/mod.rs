//! # Persistent Storage
//!
//! Disk-backed `QuadStore` implementations.

pub mod redb_store;

pub use redb_store::RedbStore;
