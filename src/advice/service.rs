//! Recommendation flow: prompt, single provider call, formatting.

use crate::common::error::GradeResult;

use super::client::TextGenerator;
use super::domain::{AdvicePayload, Recommendation};
use super::format::format_advice;
use super::prompt::build_prompt;

/// Ask `generator` for advice on a prior prediction and format the answer.
pub async fn recommend(
    generator: &dyn TextGenerator,
    payload: &AdvicePayload,
) -> GradeResult<Recommendation> {
    let prompt = build_prompt(payload);
    let raw = generator.generate(&prompt).await?;
    let advice = format_advice(&raw);
    tracing::debug!(ev = "advice_formatted", sections = advice.sections.len());
    Ok(Recommendation { advice, raw })
}
