//! Bucketgate API Library
//!
//! HTTP surface of the upload broker: access-token middleware, handlers for the direct,
//! presigned single-part and presigned multipart protocols, and application setup.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
