//! Templar HTTP API server.
//!
//! Wires the tiered object store, the metadata catalog, and the background
//! job worker behind the `/api/v1` surface.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod worker;

pub use error::{ApiError, ApiResult, Envelope};
pub use routes::create_router;
pub use state::AppState;
pub use worker::JobQueue;
