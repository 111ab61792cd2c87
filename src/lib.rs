//! Distill document service
//!
//! Extracts text from uploaded documents, falling back to OCR page by page
//! where the text layer is unusable, and turns it into a summary or a
//! translation downloadable as plain text and PDF.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
