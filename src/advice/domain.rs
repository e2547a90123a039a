//! Domain types for clinical advice requests and their formatted output.

use serde::Serialize;

/// Prediction summary the advice prompt is built from.
#[derive(Clone, Debug, PartialEq)]
pub struct AdvicePayload {
    pub predicted_class: String,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub model_name: String,
    pub test_accuracy: f32,
    pub inference_ms: f64,
}

/// Sections of a formatted recommendation, in display order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Title,
    Summary,
    ClinicalSignificance,
    RecommendedActions,
    Disclaimer,
}

impl SectionKind {
    /// Display order; lines seen before any heading land in the first entry.
    pub const ORDER: [SectionKind; 5] = [
        SectionKind::Title,
        SectionKind::Summary,
        SectionKind::ClinicalSignificance,
        SectionKind::RecommendedActions,
        SectionKind::Disclaimer,
    ];

    /// Heading the prompt asks for and the formatter matches on.
    pub fn heading(&self) -> &'static str {
        match self {
            SectionKind::Title => "Tiêu đề",
            SectionKind::Summary => "Tóm tắt AI",
            SectionKind::ClinicalSignificance => "Ý nghĩa lâm sàng",
            SectionKind::RecommendedActions => "Hành động đề xuất",
            SectionKind::Disclaimer => "Lưu ý",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: &'static str,
    pub bullets: Vec<String>,
}

/// Recommendation text split into labelled bullet sections.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormattedAdvice {
    pub sections: Vec<Section>,
}

impl FormattedAdvice {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

/// Formatted advice plus the provider's untouched text.
#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    pub advice: FormattedAdvice,
    pub raw: String,
}
