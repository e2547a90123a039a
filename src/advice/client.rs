//! Text generation client (Gemini `generateContent`).
//!
//! One attempt per call, bounded by the configured timeout. A missing
//! credential fails before any request is sent.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::config::LlmCfg;
use crate::common::error::{GradeError, GradeResult};
use crate::common::time;

const ERROR_BODY_LIMIT: usize = 300;

/// Anything that can turn a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> GradeResult<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Extract the concatenated text of the first candidate.
fn extract_text(body: &str) -> GradeResult<String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| GradeError::Parse(e.to_string()))?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GradeError::Parse(
            "response has no candidates[0].content.parts[].text".into(),
        ));
    }
    Ok(text)
}

fn truncate(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(cfg: &LlmCfg) -> GradeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| GradeError::config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            timeout: cfg.timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn transport_error(&self, err: reqwest::Error) -> GradeError {
        if err.is_timeout() {
            GradeError::Timeout(self.timeout)
        } else {
            // Strip the URL so query strings never reach logs or clients.
            GradeError::Request(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> GradeResult<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GradeError::config("GEMINI_API_KEY is not set"))?;

        let start = Instant::now();
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        tracing::info!(
            ev = "llm_call",
            status = status.as_u16(),
            dur_ms = time::elapsed_ms(start),
            model = %self.model
        );

        if !status.is_success() {
            return Err(GradeError::Api {
                status: status.as_u16(),
                body: truncate(&text, ERROR_BODY_LIMIT),
            });
        }
        extract_text(&text)
    }
}
