//! Prompt template for the clinical recommendation request.

use std::fmt::Write;

use crate::inference::domain::KlGrade;

use super::domain::{AdvicePayload, SectionKind};

/// `KL0: 12.3%, KL1: 45.6%, ...`
pub fn probability_breakdown(probabilities: &[f32]) -> String {
    probabilities
        .iter()
        .enumerate()
        .map(|(idx, p)| format!("KL{idx}: {:.1}%", p * 100.0))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the fixed Vietnamese prompt for `payload`.
pub fn build_prompt(payload: &AdvicePayload) -> String {
    let class = payload.predicted_class.trim();
    let (tag, grade_line) = match KlGrade::from_label(class) {
        Some(grade) => (
            format!("KL{}", grade.index()),
            format!("{} (gợi ý cơ bản: {})", grade.label(), grade.baseline_advice()),
        ),
        None => (format!("KL{class}"), format!("KL{class}")),
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Bạn là bác sĩ cơ xương khớp. Dựa trên kết quả phân loại X-quang khớp gối theo thang Kellgren-Lawrence dưới đây, hãy viết khuyến nghị ngắn gọn bằng tiếng Việt cho bệnh nhân."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Kết quả mô hình:");
    let _ = writeln!(out, "- Phân độ dự đoán: {grade_line}");
    let _ = writeln!(out, "- Độ tin cậy: {:.1}%", payload.confidence * 100.0);
    let _ = writeln!(
        out,
        "- Mô hình: {} (độ chính xác trên tập kiểm thử: {:.1}%)",
        payload.model_name,
        payload.test_accuracy * 100.0
    );
    let _ = writeln!(out, "- Thời gian suy luận: {:.1} ms", payload.inference_ms);
    let _ = writeln!(
        out,
        "- Phân bố xác suất: {}",
        probability_breakdown(&payload.probabilities)
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Trả lời đúng theo cấu trúc sau, mỗi mục bắt đầu bằng tiêu đề trên một dòng riêng, nội dung dạng gạch đầu dòng, không dùng markdown:"
    );
    let _ = writeln!(
        out,
        "{}: một dòng tiêu đề ngắn nêu phân độ {tag}",
        SectionKind::Title.heading()
    );
    let _ = writeln!(
        out,
        "{}: 1-2 câu tóm tắt kết quả và mức độ tin cậy",
        SectionKind::Summary.heading()
    );
    let _ = writeln!(
        out,
        "{}: 2-3 gạch đầu dòng về ý nghĩa của phân độ này",
        SectionKind::ClinicalSignificance.heading()
    );
    let _ = writeln!(
        out,
        "{}: 3-5 gạch đầu dòng về vận động, cân nặng, điều trị và tái khám",
        SectionKind::RecommendedActions.heading()
    );
    let _ = write!(
        out,
        "{}: nhắc rằng kết quả chỉ mang tính tham khảo, cần bác sĩ chuyên khoa xác nhận",
        SectionKind::Disclaimer.heading()
    );
    out
}
