//! HTTP surface: health check, index page, `/predict` and `/recommend`.
//!
//! Handlers return `GradeResult`; [`GradeError`] renders itself as
//! `{ok: false, error}` with the status from [`GradeError::http_status`].

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::advice::{self, AdvicePayload, FormattedAdvice, TextGenerator};
use crate::common::config::AppCfg;
use crate::common::error::{GradeError, GradeResult};
use crate::common::time;
use crate::inference::{service, KlGrade, Preprocess, SharedModel, CLASSES, NUM_CLASSES};

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// State shared by every handler.
pub struct AppState {
    pub model: SharedModel,
    pub preprocess: Preprocess,
    pub advisor: Arc<dyn TextGenerator>,
    pub model_name: String,
    pub test_acc: f32,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(cfg: &AppCfg, model: SharedModel, advisor: Arc<dyn TextGenerator>) -> Self {
        Self {
            model,
            preprocess: Preprocess::default(),
            advisor,
            model_name: cfg.model_name.clone(),
            test_acc: cfg.test_acc,
        }
    }
}

/// Build the application router.
pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/predict", post(predict))
        .route("/recommend", post(recommend))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

impl IntoResponse for GradeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(ev = "request_failed", code = self.code() as u32, error = %self);
        } else {
            tracing::warn!(ev = "request_rejected", code = self.code() as u32, error = %self);
        }
        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn render_index(model_name: &str, test_acc: f32) -> String {
    INDEX_TEMPLATE
        .replace("{{ model_name }}", &escape_html(model_name))
        .replace("{{ test_acc }}", &format!("{:.1}%", test_acc * 100.0))
}

async fn index(State(state): State<SharedState>) -> Html<String> {
    Html(render_index(&state.model_name, state.test_acc))
}

/// Tolerance on `sum(probs) == 1` for `/recommend` payloads.
const PROB_SUM_TOLERANCE: f32 = 1e-3;

/// Map a body extraction failure, keeping the body limit distinct from bad input.
fn body_error(status: StatusCode, detail: String) -> GradeError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        GradeError::PayloadTooLarge(detail)
    } else {
        GradeError::invalid(detail)
    }
}

struct Upload {
    file_name: String,
    bytes: Bytes,
}

/// Pull the `file` field out of the form, rejecting absent or empty uploads.
async fn read_upload(multipart: &mut Multipart) -> GradeResult<Upload> {
    let malformed = |e: MultipartError| body_error(e.status(), e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(GradeError::invalid("Chưa chọn file."));
        }
        let bytes = field.bytes().await.map_err(malformed)?;
        if bytes.is_empty() {
            return Err(GradeError::invalid("Tệp ảnh rỗng."));
        }
        return Ok(Upload { file_name, bytes });
    }
    Err(GradeError::invalid("Không thấy file ảnh."))
}

#[derive(Debug, Serialize)]
struct PredictBody {
    ok: bool,
    class: &'static str,
    confidence: f32,
    probs: Vec<f32>,
    classes: [&'static str; NUM_CLASSES],
    model: String,
    inference_ms: f64,
    test_acc: f32,
}

async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> GradeResult<Json<PredictBody>> {
    let mut multipart = multipart.map_err(|e| GradeError::invalid(e.body_text()))?;
    let upload = read_upload(&mut multipart).await?;
    tracing::info!(ev = "upload", file = %upload.file_name, bytes = upload.bytes.len());

    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let model = worker.model.get()?;
        service::predict(&upload.bytes, model.as_ref(), &worker.preprocess)
    })
    .await
    .map_err(|e| GradeError::Inference(format!("inference task failed: {e}")))??;

    Ok(Json(PredictBody {
        ok: true,
        class: result.label(),
        confidence: result.confidence(),
        probs: result.probabilities.clone(),
        classes: CLASSES,
        model: state.model_name.clone(),
        inference_ms: time::round1(result.elapsed_ms),
        test_acc: state.test_acc,
    }))
}

/// `class` arrives as the label string from `/predict`, or as a bare index.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassField {
    Label(String),
    Index(u64),
}

/// Body of `/recommend`, mirroring a `/predict` response.
#[derive(Debug, Deserialize)]
struct RecommendRequest {
    class: ClassField,
    confidence: f32,
    probs: Vec<f32>,
    model: Option<String>,
    inference_ms: Option<f64>,
    test_acc: Option<f32>,
}

fn unit_interval(name: &str, value: f32) -> GradeResult<f32> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(GradeError::invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

impl RecommendRequest {
    fn into_payload(self, default_model: &str, default_test_acc: f32) -> GradeResult<AdvicePayload> {
        let label = match self.class {
            ClassField::Label(label) => label,
            ClassField::Index(idx) => idx.to_string(),
        };
        let grade = KlGrade::from_label(&label).ok_or_else(|| {
            GradeError::invalid(format!("class must be one of KL0..KL4, got {label:?}"))
        })?;
        if self.probs.len() != NUM_CLASSES {
            return Err(GradeError::invalid(format!(
                "probs must have {NUM_CLASSES} entries, got {}",
                self.probs.len()
            )));
        }
        for p in &self.probs {
            unit_interval("probs[]", *p)?;
        }
        let total: f32 = self.probs.iter().sum();
        if (total - 1.0).abs() > PROB_SUM_TOLERANCE {
            return Err(GradeError::invalid(format!("probs must sum to 1, got {total}")));
        }
        let inference_ms = self.inference_ms.unwrap_or(0.0);
        if !inference_ms.is_finite() || inference_ms < 0.0 {
            return Err(GradeError::invalid("inference_ms must be a non-negative number"));
        }

        Ok(AdvicePayload {
            predicted_class: grade.index().to_string(),
            confidence: unit_interval("confidence", self.confidence)?,
            probabilities: self.probs,
            model_name: self
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            test_accuracy: unit_interval("test_acc", self.test_acc.unwrap_or(default_test_acc))?,
            inference_ms,
        })
    }
}

#[derive(Debug, Serialize)]
struct RecommendBody {
    ok: bool,
    advice: String,
    sections: FormattedAdvice,
    raw: String,
}

async fn recommend(
    State(state): State<SharedState>,
    body: Result<Bytes, BytesRejection>,
) -> GradeResult<Json<RecommendBody>> {
    let body = body.map_err(|e| body_error(e.status(), e.body_text()))?;
    let request: RecommendRequest = serde_json::from_slice(&body)
        .map_err(|e| GradeError::invalid(format!("invalid JSON payload: {e}")))?;
    let payload = request.into_payload(&state.model_name, state.test_acc)?;

    let rec = advice::service::recommend(state.advisor.as_ref(), &payload).await?;
    Ok(Json(RecommendBody {
        ok: true,
        advice: rec.advice.render(),
        sections: rec.advice,
        raw: rec.raw,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::advice::client::tests::spawn_stub;
    use crate::advice::GeminiClient;
    use crate::common::config::LlmCfg;
    use crate::inference::service::tests::{gray_png, FixedLogits};
    use crate::inference::{Classifier, LazyModel};

    const BOUNDARY: &str = "klgrade-test-boundary";

    struct CannedAdvice(&'static str);

    #[async_trait]
    impl TextGenerator for CannedAdvice {
        async fn generate(&self, _prompt: &str) -> GradeResult<String> {
            Ok(self.0.to_string())
        }
    }

    fn state_with(loads: Arc<AtomicUsize>, advisor: Arc<dyn TextGenerator>) -> SharedState {
        let model: SharedModel = LazyModel::new(move || {
            loads.fetch_add(1, Ordering::SeqCst);
            let model: Arc<dyn Classifier> =
                Arc::new(FixedLogits::new(vec![-1.0, 0.2, 3.1, 0.4, -2.0]));
            Ok(model)
        });
        Arc::new(AppState {
            model,
            preprocess: Preprocess::default(),
            advisor,
            model_name: "ResNet18".into(),
            test_acc: 0.678,
        })
    }

    fn app(loads: Arc<AtomicUsize>) -> Router {
        router(
            state_with(loads, Arc::new(CannedAdvice("Tóm tắt AI: ổn"))),
            1024 * 1024,
        )
    }

    fn multipart_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn prior_prediction() -> Value {
        json!({
            "class": "2",
            "confidence": 0.62,
            "probs": [0.05, 0.1, 0.62, 0.2, 0.03],
            "model": "ResNet18",
            "inference_ms": 35.2,
            "test_acc": 0.678
        })
    }

    #[tokio::test]
    async fn healthz_is_plain_ok() {
        let resp = app(Arc::default())
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn index_shows_model_and_accuracy() {
        let resp = app(Arc::default())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("ResNet18"));
        assert!(html.contains("67.8%"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn index_escapes_model_name() {
        let html = render_index("<b>net</b>", 0.5);
        assert!(html.contains("&lt;b&gt;net&lt;/b&gt;"));
        assert!(!html.contains("<b>net</b>"));
        assert!(html.contains("50.0%"));
    }

    #[tokio::test]
    async fn grayscale_upload_is_graded() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resp = app(Arc::clone(&loads))
            .oneshot(multipart_request("file", "knee.png", &gray_png(100, 100)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = read_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["class"], "2");
        assert_eq!(body["classes"], json!(["0", "1", "2", "3", "4"]));
        let probs = body["probs"].as_array().unwrap();
        assert_eq!(probs.len(), 5);
        let sum: f64 = probs.iter().map(|p| p.as_f64().unwrap()).sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert_eq!(body["model"], "ResNet18");
        assert!(body["inference_ms"].as_f64().unwrap() >= 0.0);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_predictions_reuse_the_model() {
        let loads = Arc::new(AtomicUsize::new(0));
        let app = app(Arc::clone(&loads));
        for _ in 0..3 {
            let resp = app
                .clone()
                .oneshot(multipart_request("file", "knee.png", &gray_png(20, 30)))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_filename_is_rejected_without_loading() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resp = app(Arc::clone(&loads))
            .oneshot(multipart_request("file", "", &gray_png(10, 10)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Chưa chọn file.");
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resp = app(Arc::clone(&loads))
            .oneshot(multipart_request("image", "knee.png", &gray_png(10, 10)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(resp).await["error"], "Không thấy file ảnh.");
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_multipart_body_is_rejected() {
        let resp = app(Arc::default())
            .oneshot(json_request("/predict", "{}".into()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(resp).await["ok"], false);
    }

    #[tokio::test]
    async fn corrupt_image_is_a_server_error() {
        let resp = app(Arc::default())
            .oneshot(multipart_request("file", "knee.png", b"not an image"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(resp).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("cannot decode image"));
    }

    #[tokio::test]
    async fn load_failure_surfaces_and_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let model: SharedModel = LazyModel::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(GradeError::load("knee_resnet18.pt", "file not found"))
        });
        let state = Arc::new(AppState {
            model,
            preprocess: Preprocess::default(),
            advisor: Arc::new(CannedAdvice("")),
            model_name: "ResNet18".into(),
            test_acc: 0.678,
        });
        let app = router(state, 1024 * 1024);

        for _ in 0..2 {
            let resp = app
                .clone()
                .oneshot(multipart_request("file", "knee.png", &gray_png(10, 10)))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let error = read_json(resp).await["error"].as_str().unwrap().to_string();
            assert!(error.contains("knee_resnet18.pt"));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn recommend_returns_formatted_advice() {
        let advisor = Arc::new(CannedAdvice(
            "**Tóm tắt AI:** Thoái hóa nhẹ\n\n\nHành động đề xuất\n* Tập luyện đều\n- Giảm cân",
        ));
        let app = router(state_with(Arc::default(), advisor), 1024 * 1024);
        let resp = app
            .oneshot(json_request("/recommend", prior_prediction().to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = read_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(
            body["advice"],
            "Tóm tắt AI\n• Thoái hóa nhẹ\n\nHành động đề xuất\n• Tập luyện đều\n• Giảm cân"
        );
        assert_eq!(body["sections"][0]["kind"], "summary");
        assert_eq!(body["sections"][1]["bullets"], json!(["Tập luyện đều", "Giảm cân"]));
        assert!(body["raw"].as_str().unwrap().starts_with("**Tóm tắt AI:**"));
    }

    #[tokio::test]
    async fn recommend_accepts_numeric_class_and_defaults() {
        let resp = app(Arc::default())
            .oneshot(json_request(
                "/recommend",
                json!({"class": 4, "confidence": 0.9, "probs": [0.0, 0.0, 0.05, 0.05, 0.9]})
                    .to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    struct CountingAdvice(AtomicUsize);

    #[async_trait]
    impl TextGenerator for CountingAdvice {
        async fn generate(&self, _prompt: &str) -> GradeResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("Lưu ý: tham khảo".into())
        }
    }

    #[tokio::test]
    async fn recommend_rejects_bad_payloads_before_calling_provider() {
        let valid_probs = json!([0.1, 0.2, 0.4, 0.2, 0.1]);
        let cases = [
            "not json".to_string(),
            json!({"confidence": 0.5, "probs": valid_probs}).to_string(),
            json!({"class": "1", "confidence": 1.5, "probs": valid_probs}).to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": []}).to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": "0.5"}).to_string(),
            json!({"class": " ", "confidence": 0.5, "probs": valid_probs}).to_string(),
            json!({"class": "banana", "confidence": 0.5, "probs": valid_probs}).to_string(),
            json!({"class": "KL7", "confidence": 0.5, "probs": valid_probs}).to_string(),
            json!({"class": 5, "confidence": 0.5, "probs": valid_probs}).to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": vec![0.5; 40]}).to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": [0.5, 0.5]}).to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": [0.5, 0.5, 0.5, 0.0, 0.0]})
                .to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": [0.1, 0.1, 0.1, 0.1, 0.1]})
                .to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": [1.2, -0.2, 0.0, 0.0, 0.0]})
                .to_string(),
            json!({"class": "1", "confidence": 0.5, "probs": valid_probs, "inference_ms": -3.0})
                .to_string(),
        ];

        let advisor = Arc::new(CountingAdvice(AtomicUsize::new(0)));
        let app = router(state_with(Arc::default(), advisor.clone()), 1024 * 1024);
        for case in cases {
            let resp = app
                .clone()
                .oneshot(json_request("/recommend", case.clone()))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload {case}");
            assert_eq!(read_json(resp).await["ok"], false);
        }
        assert_eq!(advisor.0.load(Ordering::SeqCst), 0);

        let resp = app
            .oneshot(json_request(
                "/recommend",
                json!({"class": "KL2", "confidence": 0.4, "probs": valid_probs}).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(advisor.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_class_is_normalised_to_index() {
        let request: RecommendRequest = serde_json::from_value(json!({
            "class": "kl3",
            "confidence": 0.7,
            "probs": [0.05, 0.05, 0.1, 0.7, 0.1]
        }))
        .unwrap();
        let payload = request.into_payload("ResNet18", 0.678).unwrap();
        assert_eq!(payload.predicted_class, "3");
        assert_eq!(payload.model_name, "ResNet18");
        assert!((payload.test_accuracy - 0.678).abs() < 1e-6);
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let loads = Arc::new(AtomicUsize::new(0));
        let app = router(
            state_with(Arc::clone(&loads), Arc::new(CannedAdvice(""))),
            1024,
        );
        let resp = app
            .oneshot(multipart_request("file", "knee.png", &vec![7u8; 16 * 1024]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = read_json(resp).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().starts_with("request body too large"));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_recommend_body_is_payload_too_large() {
        let advisor = Arc::new(CountingAdvice(AtomicUsize::new(0)));
        let app = router(state_with(Arc::default(), advisor.clone()), 1024);
        let mut payload = prior_prediction();
        payload["model"] = json!("x".repeat(2048));

        let resp = app
            .oneshot(json_request("/recommend", payload.to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = read_json(resp).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().starts_with("request body too large"));
        assert_eq!(advisor.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_rate_limit_becomes_server_error() {
        let stub = Router::new().route(
            "/v1beta/models/:call",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "RESOURCE_EXHAUSTED") }),
        );
        let base_url = spawn_stub(stub).await;
        let client = GeminiClient::new(&LlmCfg {
            api_key: Some("test-key".into()),
            model: "gemini-test".into(),
            base_url,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let payload = prior_prediction();
        let app = router(state_with(Arc::default(), Arc::new(client)), 1024 * 1024);
        let resp = app
            .oneshot(json_request("/recommend", payload.to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_json(resp).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("429"));
        assert_eq!(payload["class"], "2");
    }

    #[tokio::test]
    async fn missing_credential_fails_closed() {
        let client = GeminiClient::new(&LlmCfg {
            api_key: None,
            model: "gemini-test".into(),
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let app = router(state_with(Arc::default(), Arc::new(client)), 1024 * 1024);
        let resp = app
            .oneshot(json_request("/recommend", prior_prediction().to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = read_json(resp).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("GEMINI_API_KEY"));
    }
}
