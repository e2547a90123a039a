use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use klgrade::advice::{GeminiClient, TextGenerator};
use klgrade::common::{log, AppCfg};
use klgrade::inference::{model, Classifier, SharedModel, NUM_CLASSES};
use klgrade::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppCfg::load().context("loading configuration")?;
    log::init(&cfg.log_level);

    let device = model::parse_device(&cfg.device).context("selecting inference device")?;
    let weights = cfg.weights_path.clone();
    let shared: SharedModel = SharedModel::new(move || {
        let net: Arc<dyn Classifier> = Arc::new(model::load(&weights, device, NUM_CLASSES)?);
        Ok(net)
    });

    if cfg.llm.api_key.is_none() {
        tracing::warn!(ev = "llm_disabled", "GEMINI_API_KEY is not set; /recommend will fail");
    }
    let advisor: Arc<dyn TextGenerator> =
        Arc::new(GeminiClient::new(&cfg.llm).context("building text generation client")?);

    let state = Arc::new(AppState::new(&cfg, shared, advisor));
    let app = router(state, cfg.max_upload_bytes);

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(
        ev = "listening",
        addr = %addr,
        device = %cfg.device,
        weights = %cfg.weights_path.display(),
        model = %cfg.model_name
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!(ev = "shutdown");
        })
        .await
        .context("serving HTTP")?;
    Ok(())
}
