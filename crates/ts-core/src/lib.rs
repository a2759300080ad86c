//! # ts-core
//!
//! Core types and error handling for tmdstat.
//!
//! This crate provides:
//! - Common error types
//! - The kinematic variable catalogue used by binning tables
//! - Small summary-statistics helpers shared by binning and post-processing
//! - Provenance metadata for JSON artifacts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod meta;
pub mod stats;
pub mod types;

pub use error::{Error, Result};
pub use meta::ArtifactMeta;
pub use types::{SENTINEL_MAX, SENTINEL_MIN, Variable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
