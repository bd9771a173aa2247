//! # Labeler Common Library
//!
//! Shared code for the image labeling service:
//! - Error taxonomy
//! - Configuration resolution
//! - API request/response types and the label data model
//! - Tile selection model mirrored by the browser UI
//! - Database initialization

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;
pub mod selection;

pub use error::{Error, Result};
