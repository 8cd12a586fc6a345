use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::local_engine::LocalConfig;
use crate::remote_engine::{DEFAULT_ENDPOINT, RetryPolicy};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Emit logs as JSON lines
    #[arg(long, env = "SMARDITY_LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(flatten)]
    pub backends: BackendConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve POST /predict over HTTP
    Serve(ServeConfig),
    /// Classify one contract and print the prediction
    Classify(ClassifyConfig),
    /// Score the remote model against a labeled test set
    Evaluate(EvaluateConfig),
}

#[derive(Debug, Clone, Args)]
pub struct BackendConfig {
    /// Program that runs the local classifier
    #[arg(long, env = "SMARDITY_CLASSIFIER_PROGRAM", default_value = "python3", global = true)]
    pub classifier_program: String,

    /// Arguments placed before the contract and model id, comma separated
    #[arg(
        long,
        env = "SMARDITY_CLASSIFIER_ARGS",
        default_value = "bert_predict.py",
        value_delimiter = ',',
        global = true
    )]
    pub classifier_args: Vec<String>,

    /// Gemini generateContent endpoint
    #[arg(long, env = "GEMINI_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    pub gemini_endpoint: String,

    /// API key passed as the `key` query parameter
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub gemini_api_key: Option<String>,

    /// Few-shot corpus embedded into the remote prompt
    #[arg(
        long,
        env = "SMARDITY_FEW_SHOT_PATH",
        default_value = "assets/few_shot_examples.json",
        global = true
    )]
    pub few_shot_path: PathBuf,

    /// Replacement prompt instructions; must contain `{examples}` and `[CONTRACT]` once each
    #[arg(long, env = "SMARDITY_PROMPT_TEMPLATE_PATH", global = true)]
    pub prompt_template_path: Option<PathBuf>,

    /// Remote attempts per classification
    #[arg(long, env = "SMARDITY_MAX_ATTEMPTS", default_value = "3", global = true)]
    pub max_attempts: u32,

    /// Seconds to wait between remote attempts
    #[arg(long, env = "SMARDITY_RETRY_DELAY_SECS", default_value = "30", global = true)]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    /// Server host to bind to
    #[arg(long, env = "SMARDITY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "SMARDITY_PORT", default_value = "5992")]
    pub port: u16,

    /// Model used when a request omits `model`
    #[arg(long, env = "SMARDITY_DEFAULT_MODEL", default_value = "CodeBERT-solidifi_uncomment")]
    pub default_model: String,
}

#[derive(Debug, Clone, Args)]
pub struct ClassifyConfig {
    /// Contract file; reads stdin when omitted
    pub file: Option<PathBuf>,

    /// Model id; `gemini` selects the remote backend
    #[arg(long, default_value = "CodeBERT-solidifi")]
    pub model: String,
}

#[derive(Debug, Clone, Args)]
pub struct EvaluateConfig {
    /// Labeled test set
    #[arg(long, env = "SMARDITY_TEST_SET_PATH", default_value = "assets/test_data.json")]
    pub test_set: PathBuf,

    /// Number of examples to evaluate, from the start of the set
    #[arg(long, default_value = "9")]
    pub limit: usize,

    /// Write the full report as JSON
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl From<&BackendConfig> for LocalConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            program: config.classifier_program.clone(),
            args: config.classifier_args.clone(),
        }
    }
}

impl From<&BackendConfig> for RetryPolicy {
    fn from(config: &BackendConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

impl ServeConfig {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
