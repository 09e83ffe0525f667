//! HTTP control API
//!
//! JSON endpoints over the DJ session plus an SSE event stream. Errors are
//! returned as `{"status": "error: ..."}` with a matching status code.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
