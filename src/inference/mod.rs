//! Inference domain: preprocessing, model loading, the lazy model holder and
//! the prediction service.

pub mod domain;
pub mod lazy;
#[cfg(feature = "torch")]
pub mod model;
pub mod preprocess;
pub mod service;

pub use domain::{Classifier, KlGrade, PredictionResult, CLASSES, NUM_CLASSES};
pub use lazy::LazyModel;
pub use preprocess::Preprocess;

/// The model holder shared by every request.
pub type SharedModel = LazyModel<dyn Classifier>;
