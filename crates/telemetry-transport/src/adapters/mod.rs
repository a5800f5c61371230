//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the storage interface.

pub mod filesystem_storage;

pub use filesystem_storage::FilesystemStorage;
