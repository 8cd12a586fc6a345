use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;

use crate::engine::Engine;
use crate::types::{ClassificationRequest, ClassificationResult};

/// Model id reserved for the hosted LLM backend.
pub const REMOTE_MODEL_ID: &str = "gemini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Remote => "remote",
        }
    }
}

/// Every id except the reserved one goes to the local classifier, which
/// decides for itself whether the id names a real model.
pub fn route(model_id: &str) -> Backend {
    if model_id == REMOTE_MODEL_ID {
        Backend::Remote
    } else {
        Backend::Local
    }
}

pub struct ModelRouter {
    local: Arc<dyn Engine + Send + Sync>,
    remote: Arc<dyn Engine + Send + Sync>,
}

impl ModelRouter {
    pub fn new(local: Arc<dyn Engine + Send + Sync>, remote: Arc<dyn Engine + Send + Sync>) -> Self {
        Self { local, remote }
    }

    pub fn engine_for(&self, model_id: &str) -> &Arc<dyn Engine + Send + Sync> {
        match route(model_id) {
            Backend::Local => &self.local,
            Backend::Remote => &self.remote,
        }
    }
}

#[async_trait]
impl Engine for ModelRouter {
    #[tracing::instrument(skip(self, request), fields(model = %request.model_id, backend = tracing::field::Empty))]
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let backend = route(&request.model_id);
        tracing::Span::current().record("backend", backend.as_str());

        let result = self.engine_for(&request.model_id).classify(request).await;
        if result.is_failure() {
            counter!("classification_failures_total", "backend" => backend.as_str()).increment(1);
        }
        result
    }
}
