//! Runtime configuration loaded from the process environment.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::common::error::{GradeError, GradeResult};

/// Weight files probed in order when `WEIGHTS_PATH` is not set.
pub const WEIGHT_CANDIDATES: [&str; 2] = ["knee_resnet18.pt", "best_knee_resnet18.pt"];

/// Snapshot of configuration values consumed by the service.
#[derive(Clone, Debug)]
pub struct AppCfg {
    pub host: String,
    pub port: u16,
    pub device: String,
    pub weights_path: PathBuf,
    pub model_name: String,
    pub test_acc: f32,
    pub max_upload_bytes: usize,
    pub log_level: String,
    pub llm: LlmCfg,
}

/// Settings for the text generation provider.
#[derive(Clone, Debug)]
pub struct LlmCfg {
    /// Never defaulted; `None` makes every advice request fail closed.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl AppCfg {
    /// Create a configuration snapshot from the process environment.
    pub fn load() -> GradeResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a snapshot from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> GradeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let weights_path = match lookup("WEIGHTS_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => resolve_weights(Path::new("."), &WEIGHT_CANDIDATES),
        };

        let max_upload_mb: usize = parse_var("MAX_UPLOAD_MB", &env_or("MAX_UPLOAD_MB", "16"))?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                GradeError::config(format!("MAX_UPLOAD_MB is too large: {max_upload_mb}"))
            })?;
        let timeout_secs: u64 =
            parse_var("GEMINI_TIMEOUT_SECS", &env_or("GEMINI_TIMEOUT_SECS", "20"))?;
        if timeout_secs == 0 {
            return Err(GradeError::config("GEMINI_TIMEOUT_SECS must be at least 1"));
        }

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_var("PORT", &env_or("PORT", "5000"))?,
            device: env_or("DEVICE", "cpu"),
            weights_path,
            model_name: env_or("MODEL_NAME", "ResNet18"),
            test_acc: parse_var("TEST_ACC", &env_or("TEST_ACC", "0.678"))?,
            max_upload_bytes,
            log_level: env_or("LOG_LEVEL", "info"),
            llm: LlmCfg {
                api_key: lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()),
                model: env_or("GEMINI_MODEL", "gemini-1.5-flash"),
                base_url: env_or(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta",
                ),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Pick the first candidate that exists under `root`, else the last one so the
/// eventual load error names a concrete file.
pub fn resolve_weights(root: &Path, candidates: &[&str]) -> PathBuf {
    candidates
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.exists())
        .or_else(|| candidates.last().map(|name| root.join(name)))
        .unwrap_or_default()
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> GradeResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| GradeError::config(format!("{key} has an invalid value: {raw:?}")))
}
