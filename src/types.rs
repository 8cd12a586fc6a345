use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Literal that introduces the model's final answer.
pub const MARKER: &str = "Bug type:";

/// Label used when the model answered without a recognizable bug type.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BugType {
    #[serde(rename = "correct")]
    Correct,
    #[serde(rename = "Overflow-Underflow")]
    OverflowUnderflow,
    #[serde(rename = "Re-entrancy")]
    Reentrancy,
    #[serde(rename = "TOD")]
    Tod,
    #[serde(rename = "Timestamp-Dependency")]
    TimestampDependency,
    #[serde(rename = "Unchecked-Send")]
    UncheckedSend,
    #[serde(rename = "Unhandled-Exceptions")]
    UnhandledExceptions,
    #[serde(rename = "tx.origin")]
    TxOrigin,
}

impl BugType {
    pub const ALL: [BugType; 8] = [
        BugType::Correct,
        BugType::OverflowUnderflow,
        BugType::Reentrancy,
        BugType::Tod,
        BugType::TimestampDependency,
        BugType::UncheckedSend,
        BugType::UnhandledExceptions,
        BugType::TxOrigin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BugType::Correct => "correct",
            BugType::OverflowUnderflow => "Overflow-Underflow",
            BugType::Reentrancy => "Re-entrancy",
            BugType::Tod => "TOD",
            BugType::TimestampDependency => "Timestamp-Dependency",
            BugType::UncheckedSend => "Unchecked-Send",
            BugType::UnhandledExceptions => "Unhandled-Exceptions",
            BugType::TxOrigin => "tx.origin",
        }
    }
}

impl fmt::Display for BugType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BugType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BugType::ALL
            .into_iter()
            .find(|bug| bug.as_str() == s)
            .ok_or_else(|| format!("not a known bug type: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub code: String,
    pub model_id: String,
}

impl ClassificationRequest {
    pub fn new(code: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            model_id: model_id.into(),
        }
    }
}

/// What kind of value a [`ClassificationResult`] label carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Classified,
    Unknown,
    Failed,
}

/// Adapters never return errors; failures travel in-band as the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub raw_text: String,
    pub label: String,
    pub outcome: Outcome,
}

impl ClassificationResult {
    pub fn classified(raw_text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            label: label.into(),
            outcome: Outcome::Classified,
        }
    }

    pub fn unknown(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            label: UNKNOWN_LABEL.to_string(),
            outcome: Outcome::Unknown,
        }
    }

    pub fn failed(raw_text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            label: label.into(),
            outcome: Outcome::Failed,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// Few-shot record embedded into the remote prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FewShotExample {
    pub buggy_contract: String,
    pub bug_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestExample {
    pub contract: String,
    #[serde(rename = "type")]
    pub true_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationRecord {
    pub index: usize,
    pub true_label: String,
    pub predicted_label: String,
    #[serde(rename = "match")]
    pub is_match: bool,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: String,
}
