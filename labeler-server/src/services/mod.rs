//! Image index, session assembly, login, batches and uploads

pub mod auth;
pub mod batches;
pub mod image_index;
pub mod session_assembler;
pub mod uploads;

pub use auth::{AuthError, Authenticator, Claims};
pub use batches::BatchSet;
pub use image_index::{ImageIndex, ImageSnapshot};
pub use session_assembler::build_session;
pub use uploads::{sanitize_file_name, UploadKind, UploadStore, MAX_UPLOAD_BYTES};
