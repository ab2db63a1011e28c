//! Outbound HTTP execution for gateway calls.

pub mod service;

pub use service::{send_request, Response};
