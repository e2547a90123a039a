//! Public entry points for the HTTP surface.

pub mod http;

pub use http::{router, AppState, SharedState};
