//! Prediction service: decode, preprocess, forward, softmax.

use std::time::Instant;

use image::DynamicImage;

use crate::common::error::{GradeError, GradeResult};
use crate::common::time;

use super::domain::{argmax, softmax, Classifier, PredictionResult};
use super::preprocess::Preprocess;

/// Decode uploaded bytes in any supported format.
pub fn decode_image(bytes: &[u8]) -> GradeResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(GradeError::ImageDecode("empty upload".into()));
    }
    image::load_from_memory(bytes).map_err(|e| GradeError::ImageDecode(e.to_string()))
}

/// Grade an encoded image with an already loaded model.
pub fn predict(
    bytes: &[u8],
    model: &dyn Classifier,
    preprocess: &Preprocess,
) -> GradeResult<PredictionResult> {
    let img = decode_image(bytes)?;
    predict_image(&img, model, preprocess)
}

/// Grade a decoded image. Only the forward pass is timed.
pub fn predict_image(
    img: &DynamicImage,
    model: &dyn Classifier,
    preprocess: &Preprocess,
) -> GradeResult<PredictionResult> {
    let input = preprocess.apply(img);

    let start = Instant::now();
    let logits = model.logits(&input)?;
    let elapsed_ms = time::elapsed_ms(start);

    if logits.iter().any(|v| !v.is_finite()) {
        return Err(GradeError::Inference("model produced non-finite logits".into()));
    }
    let class_index =
        argmax(&logits).ok_or_else(|| GradeError::Inference("model produced no logits".into()))?;
    let probabilities = softmax(&logits);

    tracing::debug!(ev = "predicted", class_index, dur_ms = elapsed_ms);
    Ok(PredictionResult {
        class_index,
        probabilities,
        elapsed_ms,
    })
}
