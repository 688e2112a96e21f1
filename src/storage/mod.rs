//! SQLite storage layer for contactsync.
//!
//! This module provides the local replica using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - A versioned schema with an upgrade ladder
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`migrations`] - Upgrades from older schema versions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use sqlite::{MutationContext, SqliteStorage, StoreCounts};
