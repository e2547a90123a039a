//! Shared utilities that glue the inference and advice domains together.
pub mod config;
pub mod error;
pub mod log;
pub mod time;

pub use config::{AppCfg, LlmCfg};
pub use error::{GradeCode, GradeError, GradeResult};
