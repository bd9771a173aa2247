//! Database initialization for the label store

pub mod init;

pub use init::*;
