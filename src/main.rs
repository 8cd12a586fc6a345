mod config;
mod engine;
mod evaluation;
mod fixtures;
mod local_engine;
mod preprocess;
mod prompt;
mod remote_engine;
mod router;
mod types;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use metrics::counter;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::{BackendConfig, ClassifyConfig, Command, Config, EvaluateConfig, ServeConfig};
use engine::Engine;
use evaluation::{EvaluationHarness, EvaluationReport};
use local_engine::LocalEngine;
use preprocess::clean;
use prompt::{DEFAULT_INSTRUCTIONS, PromptTemplate};
use remote_engine::{GeminiProvider, RemoteEngine, RetryPolicy};
use router::{Backend, ModelRouter, REMOTE_MODEL_ID, route};
use types::{ClassificationRequest, PredictRequest, PredictResponse};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    init_tracing(config.log_json);

    match &config.command {
        Command::Serve(serve) => run_server(&config.backends, serve).await,
        Command::Classify(classify) => run_classify(&config.backends, classify).await,
        Command::Evaluate(evaluate) => run_evaluation(&config.backends, evaluate).await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,smardity=debug".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_template(backends: &BackendConfig) -> anyhow::Result<PromptTemplate> {
    let examples = fixtures::load_few_shot(&backends.few_shot_path)?;
    let instructions = match &backends.prompt_template_path {
        Some(path) => fixtures::load_instructions(path)?,
        None => DEFAULT_INSTRUCTIONS.to_string(),
    };
    let template = PromptTemplate::new(&instructions, &examples).context("invalid prompt template")?;
    tracing::info!(examples = examples.len(), "Prompt template loaded");
    Ok(template)
}

fn build_remote(backends: &BackendConfig, require_key: bool) -> anyhow::Result<RemoteEngine> {
    // Evaluation and one-shot remote runs cannot work without a key
    let api_key = match &backends.gemini_api_key {
        Some(key) => key.clone(),
        None if require_key => {
            anyhow::bail!("--gemini-api-key (or GEMINI_API_KEY) is required for the remote backend")
        }
        None => {
            tracing::warn!("No Gemini API key configured, remote requests will fail");
            String::new()
        }
    };

    let provider = GeminiProvider::new(backends.gemini_endpoint.clone(), api_key);
    let retry = RetryPolicy::from(backends);
    tracing::info!(
        endpoint = %backends.gemini_endpoint,
        max_attempts = retry.max_attempts,
        delay_secs = retry.delay.as_secs(),
        "Remote backend configured"
    );

    // The template is validated here, before any request is accepted
    Ok(RemoteEngine::new(
        Arc::new(provider),
        Arc::new(load_template(backends)?),
        retry,
    ))
}

async fn run_server(backends: &BackendConfig, serve: &ServeConfig) -> anyhow::Result<()> {
    // Build both backends up front so a bad template fails startup
    let local = LocalEngine::new(backends.into());
    let remote = build_remote(backends, false)?;
    let router = ModelRouter::new(Arc::new(local), Arc::new(remote));

    // Expose request metrics alongside the prediction route
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = app(AppState::new(Arc::new(router), serve.default_model.clone()))
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&serve.server_address()).await?;
    tracing::info!("Server running at http://{}", serve.server_address());
    tracing::info!(default_model = %serve.default_model, "Accepting predictions");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_classify(backends: &BackendConfig, classify: &ClassifyConfig) -> anyhow::Result<()> {
    let code = match &classify.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut code = String::new();
            tokio::io::stdin().read_to_string(&mut code).await?;
            code
        }
    };

    let engine: Arc<dyn Engine + Send + Sync> = match route(&classify.model) {
        Backend::Remote => Arc::new(build_remote(backends, true)?),
        Backend::Local => Arc::new(LocalEngine::new(backends.into())),
    };

    let request = ClassificationRequest::new(clean(&code), classify.model.clone());
    let result = engine.classify(&request).await;
    if result.is_failure() {
        anyhow::bail!("{}", result.label);
    }
    println!("{}", result.raw_text);
    Ok(())
}

async fn run_evaluation(backends: &BackendConfig, evaluate: &EvaluateConfig) -> anyhow::Result<()> {
    let remote = build_remote(backends, true)?;
    let test_set = fixtures::load_test_set(&evaluate.test_set)?;
    tracing::info!(
        "Running {} test on the first {} examples",
        REMOTE_MODEL_ID,
        evaluate.limit.min(test_set.len())
    );

    let records = EvaluationHarness::new(Arc::new(remote))
        .evaluate(&test_set, evaluate.limit)
        .await;
    let report = EvaluationReport::new(REMOTE_MODEL_ID, records);
    print!("{}", report.render_table());

    if let Some(path) = &evaluate.output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }
    Ok(())
}

#[derive(Clone)]
struct AppState {
    engine: Arc<dyn Engine + Send + Sync>,
    default_model: String,
}

impl AppState {
    fn new(engine: Arc<dyn Engine + Send + Sync>, default_model: String) -> Self {
        Self {
            engine,
            default_model,
        }
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .with_state(state)
}

#[tracing::instrument(
    skip(state, request),
    fields(request_id = %uuid::Uuid::new_v4().simple(), text_len = request.text.len())
)]
async fn predict_handler(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> (StatusCode, Json<PredictResponse>) {
    counter!("predict_requests_total").increment(1);

    let model = request.model.unwrap_or_else(|| state.default_model.clone());
    tracing::info!(model = %model, "Received prediction request");

    let result = state
        .engine
        .classify(&ClassificationRequest::new(clean(&request.text), model))
        .await;

    let status = if result.is_failure() {
        tracing::error!(prediction = %result.raw_text, "Prediction failed");
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(PredictResponse {
            prediction: result.raw_text,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use crate::local_engine::LocalConfig;
    use crate::remote_engine::RETRIES_EXHAUSTED;
    use crate::remote_engine::tests::{ScriptedProvider, template};
    use tower::ServiceExt;

    fn shell_engine(script: &str) -> LocalEngine {
        LocalEngine::new(LocalConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "classifier".to_string()],
        })
    }

    fn test_app(local_script: &str, remote_replies: &[&str]) -> Router {
        let remote = RemoteEngine::new(
            Arc::new(ScriptedProvider::answering(remote_replies)),
            template(),
            RetryPolicy::immediate(3),
        );
        let router = ModelRouter::new(Arc::new(shell_engine(local_script)), Arc::new(remote));
        app(AppState::new(
            Arc::new(router),
            "CodeBERT-solidifi_uncomment".to_string(),
        ))
    }

    async fn post_predict(app: Router, body: serde_json::Value) -> (StatusCode, PredictResponse) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn omitted_model_uses_default_and_cleans_text() {
        let app = test_app("printf '%s|%s' \"$1\" \"$2\"", &[]);
        let (status, body) = post_predict(
            app,
            serde_json::json!({"text": "// header\ncontract A {}\n\n"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.prediction, "contract A {}|CodeBERT-solidifi_uncomment");
    }

    #[tokio::test]
    async fn gemini_model_goes_to_remote_backend() {
        let app = test_app("echo never; exit 1", &["Reasoning\nBug type: Unchecked-Send\n"]);
        let (status, body) = post_predict(
            app,
            serde_json::json!({"text": "contract A {}", "model": "gemini"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.prediction, "Bug type: Unchecked-Send");
    }

    #[tokio::test]
    async fn classifier_failure_is_500_with_stderr() {
        let app = test_app("echo 'model not found' >&2; exit 1", &[]);
        let (status, body) = post_predict(
            app,
            serde_json::json!({"text": "contract A {}", "model": "CodeBERT-missing"}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.prediction.starts_with("Python error: "));
        assert!(body.prediction.contains("model not found"));
    }

    #[tokio::test]
    async fn exhausted_remote_is_500() {
        let app = test_app("echo TOD", &[]);
        let (status, body) = post_predict(
            app,
            serde_json::json!({"text": "contract A {}", "model": "gemini"}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.prediction.contains(RETRIES_EXHAUSTED));
    }
}
