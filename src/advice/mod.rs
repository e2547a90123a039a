//! Clinical advice: prompt construction, the text generation client and
//! formatting of the provider's answer.

pub mod client;
pub mod domain;
pub mod format;
pub mod prompt;
pub mod service;

pub use client::{GeminiClient, TextGenerator};
pub use domain::{AdvicePayload, FormattedAdvice, Recommendation, Section, SectionKind};
pub use format::format_advice;
pub use prompt::build_prompt;
