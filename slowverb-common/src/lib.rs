//! # slowverb common library
//!
//! Shared code for the slowverb workspace:
//! - Error and result types
//! - TOML configuration loading and working directory resolution
//! - Timestamp helpers used for asset naming

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
