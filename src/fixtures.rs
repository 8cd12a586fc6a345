use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{FewShotExample, TestExample};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, FixtureError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| FixtureError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[tracing::instrument]
pub fn load_few_shot(path: &Path) -> Result<Vec<FewShotExample>, FixtureError> {
    let examples: Vec<FewShotExample> = load_json(path)?;
    tracing::debug!(count = examples.len(), "Loaded few-shot examples");
    Ok(examples)
}

#[tracing::instrument]
pub fn load_test_set(path: &Path) -> Result<Vec<TestExample>, FixtureError> {
    let examples: Vec<TestExample> = load_json(path)?;
    tracing::debug!(count = examples.len(), "Loaded test set");
    Ok(examples)
}

pub fn load_instructions(path: &Path) -> Result<String, FixtureError> {
    std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })
}
