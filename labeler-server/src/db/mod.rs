//! Database access layer for labeler-server

pub mod labels;

pub use labels::LabelStore;
