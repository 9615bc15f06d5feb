//! # Model Organizer Common Library
//!
//! Shared code for the model organizer services:
//! - Error type used across crates
//! - Root folder resolution and bootstrap TOML configuration
//! - Database initialization and the `ModelRecord` model

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
