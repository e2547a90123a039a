//! Domain definitions for knee radiograph grading.

use crate::common::error::GradeResult;

/// Class labels in model output order (KL0..KL4).
pub const CLASSES: [&str; 5] = ["0", "1", "2", "3", "4"];

/// Number of model outputs.
pub const NUM_CLASSES: usize = CLASSES.len();

/// Kellgren-Lawrence severity grade.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KlGrade {
    Normal,
    Doubtful,
    Mild,
    Moderate,
    Severe,
}

impl KlGrade {
    /// Map a class index to a grade; out-of-range indices clamp to the ends.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => KlGrade::Normal,
            1 => KlGrade::Doubtful,
            2 => KlGrade::Mild,
            3 => KlGrade::Moderate,
            _ => KlGrade::Severe,
        }
    }

    /// Parse a class label such as `"2"` or `"KL2"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        let digits = trimmed
            .strip_prefix("KL")
            .or_else(|| trimmed.strip_prefix("kl"))
            .unwrap_or(trimmed);
        digits
            .parse::<usize>()
            .ok()
            .filter(|idx| *idx < NUM_CLASSES)
            .map(Self::from_index)
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Short Vietnamese label shown to clinicians.
    pub fn label(&self) -> &'static str {
        match self {
            KlGrade::Normal => "KL0 - Bình thường",
            KlGrade::Doubtful => "KL1 - Nghi ngờ",
            KlGrade::Mild => "KL2 - Nhẹ",
            KlGrade::Moderate => "KL3 - Trung bình",
            KlGrade::Severe => "KL4 - Nặng",
        }
    }

    /// Baseline guidance for the grade, independent of any LLM output.
    pub fn baseline_advice(&self) -> &'static str {
        match self {
            KlGrade::Normal => {
                "Không cần can thiệp đặc biệt. Duy trì vận động và lối sống lành mạnh."
            }
            KlGrade::Doubtful => "Theo dõi định kỳ, điều chỉnh tư thế và tải trọng lên khớp.",
            KlGrade::Mild => {
                "Tập phục hồi chức năng, giảm cân nếu thừa cân, hạn chế quá tải khớp."
            }
            KlGrade::Moderate => {
                "Điều trị nội khoa tích cực, cân nhắc tiêm trong khớp theo chỉ định."
            }
            KlGrade::Severe => "Cân nhắc phẫu thuật thay khớp và phục hồi chức năng chuyên sâu.",
        }
    }
}

/// Preprocessed image in CHW layout, ready for a forward pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl ImageTensor {
    /// Shape with a leading batch dimension of one.
    pub fn batch_shape(&self) -> [i64; 4] {
        [1, self.channels as i64, self.height as i64, self.width as i64]
    }
}

/// Outcome of a single inference call.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionResult {
    pub class_index: usize,
    pub probabilities: Vec<f32>,
    pub elapsed_ms: f64,
}

impl PredictionResult {
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .get(self.class_index)
            .copied()
            .unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        CLASSES.get(self.class_index).copied().unwrap_or("?")
    }
}

/// An inference-ready network bound to its compute device.
///
/// Implementations must be read-only after construction: one handle serves
/// concurrent requests without locking.
pub trait Classifier: Send + Sync {
    /// Raw, unnormalised outputs for a single image.
    fn logits(&self, input: &ImageTensor) -> GradeResult<Vec<f32>>;
}

/// Max-shifted softmax; an empty input yields an empty distribution.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits
        .iter()
        .map(|&v| f64::from(v - max).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| (e / sum) as f32).collect()
}

/// Position of the largest value; the first index wins on ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}
