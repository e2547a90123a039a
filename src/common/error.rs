//! Error handling primitives shared across the core.
//!
//! Every fallible operation returns [`GradeResult`]; the HTTP layer maps the
//! variant to a status code through [`GradeError::http_status`].

use std::time::Duration;

use thiserror::Error;

/// Stable error codes, logged alongside every failure.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GradeCode {
    /// Weight file missing or incompatible with the architecture.
    Load = 1,
    /// Uploaded bytes are not a readable image.
    ImageDecode = 2,
    /// The forward pass failed or produced unusable output.
    Inference = 3,
    /// Missing or malformed configuration (including credentials).
    Config = 4,
    /// Text generation provider answered with a non-success status.
    Api = 5,
    /// Text generation provider answered with an unexpected body.
    Parse = 6,
    /// Text generation call exceeded its deadline.
    Timeout = 7,
    /// Transport failure before a response was received.
    Request = 8,
    /// Request payload failed validation.
    Validation = 9,
    /// Request body exceeded the configured upload limit.
    PayloadTooLarge = 10,
}

/// Canonical error type for the core.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("cannot load model weights from {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("cannot decode image: {0}")]
    ImageDecode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("text generation API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected text generation response: {0}")]
    Parse(String),

    #[error("text generation API timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("text generation request failed: {0}")]
    Request(String),

    #[error("{0}")]
    Validation(String),

    #[error("request body too large: {0}")]
    PayloadTooLarge(String),
}

/// Result alias used throughout the crate.
pub type GradeResult<T> = Result<T, GradeError>;

impl GradeError {
    /// Load helper.
    pub fn load(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Validation helper.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Configuration helper.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Machine readable code for logs.
    pub fn code(&self) -> GradeCode {
        match self {
            Self::Load { .. } => GradeCode::Load,
            Self::ImageDecode(_) => GradeCode::ImageDecode,
            Self::Inference(_) => GradeCode::Inference,
            Self::Config(_) => GradeCode::Config,
            Self::Api { .. } => GradeCode::Api,
            Self::Parse(_) => GradeCode::Parse,
            Self::Timeout(_) => GradeCode::Timeout,
            Self::Request(_) => GradeCode::Request,
            Self::Validation(_) => GradeCode::Validation,
            Self::PayloadTooLarge(_) => GradeCode::PayloadTooLarge,
        }
    }

    /// Validation and size failures are the caller's fault; everything else is ours.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }
}
