use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::engine::Engine;
use crate::types::{ClassificationRequest, ClassificationResult};

/// Prefix of every label produced by a failed classifier run.
pub const PROCESS_ERROR_PREFIX: &str = "Python error: ";

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["bert_predict.py".to_string()],
        }
    }
}

/// Runs the external classifier once per request.
///
/// The contract and model id are appended to the configured arguments. There
/// is no timeout: a hung classifier blocks the request until it exits.
pub struct LocalEngine {
    config: LocalConfig,
}

impl LocalEngine {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(skip(self, code), fields(program = %self.config.program, code_len = code.len()))]
    pub async fn predict(&self, code: &str, model_id: &str) -> ClassificationResult {
        let output = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(code)
            .arg(model_id)
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn classifier");
                let detail = format!("failed to spawn {}: {e}", self.config.program);
                return process_error(&detail);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() || !stderr.trim().is_empty() {
            tracing::error!(status = %output.status, stderr = %stderr.trim(), "Classifier failed");
            let detail = if stderr.trim().is_empty() {
                format!("classifier exited with {}", output.status)
            } else {
                stderr.into_owned()
            };
            return process_error(&detail);
        }

        let prediction = stdout.trim();
        tracing::debug!(prediction, "Classifier finished");
        ClassificationResult::classified(prediction, prediction)
    }
}

fn process_error(detail: &str) -> ClassificationResult {
    let label = format!("{PROCESS_ERROR_PREFIX}{detail}");
    ClassificationResult::failed(label.clone(), label)
}

#[async_trait]
impl Engine for LocalEngine {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        self.predict(&request.code, &request.model_id).await
    }
}
