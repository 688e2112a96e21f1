//! contactsync - a local contact replica kept in step with its provider
//!
//! This crate provides the reconciliation engine behind the `csync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Contact, Group and contact children)
//! - [`provider`] - The external contact source and its snapshot adapters
//! - [`storage`] - SQLite database layer, schema and upgrade ladder
//! - [`sync`] - Group deduplication and contact reconciliation
//! - [`preserve`] - Favorite/group state carried across destructive upgrades
//! - [`duplicates`] - Duplicate contact detection
//! - [`merge`] - Folding several contacts into one
//! - [`config`] - Path resolution
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod merge;
pub mod model;
pub mod preserve;
pub mod provider;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};

/// Global dry-run flag for `--dry-run`.
///
/// When set, mutate commands preview what would happen without writing.
pub static DRY_RUN: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if dry-run mode is active.
#[inline]
pub fn is_dry_run() -> bool {
    DRY_RUN.load(std::sync::atomic::Ordering::Relaxed)
}
