//! HTTP API handlers for labeler-server

pub mod auth;
pub mod batches;
pub mod health;
pub mod images;
pub mod labels;
pub mod session;
pub mod ui;
pub mod uploads;

pub use auth::{auth_middleware, login};
pub use batches::{batch_count, get_batch};
pub use health::health_routes;
pub use images::serve_image;
pub use labels::{get_label, image_stats_bulk, list_labels, save_labels};
pub use session::{get_session, refresh_index};
pub use ui::{serve_app_js, serve_index};
pub use uploads::{upload_batch, upload_non_labeled};
