//! Knee osteoarthritis Kellgren-Lawrence grading service.
//!
//! `inference` turns an X-ray into a grade distribution, `advice` turns a
//! grade into formatted clinical recommendations, and `api` serves both over
//! HTTP.
pub mod common;
pub mod inference;
pub mod advice;
pub mod api;

pub use api::http::{router, AppState, SharedState};
