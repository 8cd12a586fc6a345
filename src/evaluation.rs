use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

use crate::engine::Engine;
use crate::preprocess::clean;
use crate::router::REMOTE_MODEL_ID;
use crate::types::{ClassificationRequest, EvaluationRecord, MARKER, TestExample};

/// Scores a backend against a labeled test set, one example at a time.
pub struct EvaluationHarness {
    engine: Arc<dyn Engine + Send + Sync>,
    model_id: String,
}

impl EvaluationHarness {
    pub fn new(engine: Arc<dyn Engine + Send + Sync>) -> Self {
        Self {
            engine,
            model_id: REMOTE_MODEL_ID.to_string(),
        }
    }

    /// Records come back in source order. `match` is byte equality between
    /// the raw prediction and `"Bug type: <true label>"`.
    #[tracing::instrument(skip(self, test_set), fields(total = test_set.len()))]
    pub async fn evaluate(&self, test_set: &[TestExample], limit: usize) -> Vec<EvaluationRecord> {
        let mut records = Vec::with_capacity(limit.min(test_set.len()));

        for (i, example) in test_set.iter().take(limit).enumerate() {
            let request = ClassificationRequest::new(clean(&example.contract), &self.model_id);
            let result = self.engine.classify(&request).await;

            let expected = format!("{MARKER} {}", example.true_label);
            let is_match = result.raw_text == expected;
            tracing::info!(
                index = i + 1,
                true_label = %example.true_label,
                predicted = %result.raw_text,
                is_match,
                "Evaluated example"
            );

            records.push(EvaluationRecord {
                index: i + 1,
                true_label: example.true_label.clone(),
                predicted_label: result.raw_text,
                is_match,
            });
        }

        records
    }
}

#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub model: String,
    pub created: i64,
    pub total: usize,
    pub matched: usize,
    pub accuracy: f64,
    pub records: Vec<EvaluationRecord>,
}

impl EvaluationReport {
    pub fn new(model: impl Into<String>, records: Vec<EvaluationRecord>) -> Self {
        let total = records.len();
        let matched = records.iter().filter(|r| r.is_match).count();
        let accuracy = if total == 0 {
            0.0
        } else {
            matched as f64 / total as f64
        };

        Self {
            model: model.into(),
            created: chrono::Utc::now().timestamp(),
            total,
            matched,
            accuracy,
            records,
        }
    }

    pub fn render_table(&self) -> String {
        let mut table = String::from(" # | True Label            | Predicted Label       | Match\n");
        table.push_str("---|-----------------------|-----------------------|------\n");
        for record in &self.records {
            let _ = writeln!(
                table,
                "{:>2} | {:<21} | {:<21} | {}",
                record.index,
                record.true_label,
                record.predicted_label,
                if record.is_match { '✔' } else { '✘' }
            );
        }
        let _ = writeln!(
            table,
            "\n{}/{} matched ({:.1}%)",
            self.matched,
            self.total,
            self.accuracy * 100.0
        );
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_engine::tests::{ScriptedProvider, template};
    use crate::remote_engine::{RemoteEngine, RetryPolicy};

    fn example(contract: &str, label: &str) -> TestExample {
        TestExample {
            contract: contract.to_string(),
            true_label: label.to_string(),
        }
    }

    fn harness(provider: Arc<ScriptedProvider>) -> EvaluationHarness {
        let engine = RemoteEngine::new(provider, template(), RetryPolicy::immediate(3));
        EvaluationHarness::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn scores_each_example_in_order() {
        let provider = Arc::new(ScriptedProvider::answering(&[
            "Reasoning...\nBug type: Re-entrancy",
            "Bug type: TOD",
        ]));
        let test_set = vec![
            example("contract A {}", "Re-entrancy"),
            example("contract B {}", "tx.origin"),
        ];

        let records = harness(provider).evaluate(&test_set, 9).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 1);
        assert!(records[0].is_match);
        assert_eq!(records[0].predicted_label, "Bug type: Re-entrancy");
        assert_eq!(records[1].index, 2);
        assert!(!records[1].is_match);
        assert_eq!(records[1].true_label, "tx.origin");
    }

    #[tokio::test]
    async fn limit_caps_the_number_of_calls() {
        let provider = Arc::new(ScriptedProvider::answering(&["Bug type: correct"; 5]));
        let test_set: Vec<_> = (0..5)
            .map(|i| example(&format!("contract C{i} {{}}"), "correct"))
            .collect();

        let records = harness(provider.clone()).evaluate(&test_set, 3).await;

        assert_eq!(records.len(), 3);
        assert_eq!(provider.call_count(), 3);
        assert!(records.iter().all(|r| r.is_match));
    }

    #[tokio::test]
    async fn contracts_are_cleaned_before_classification() {
        let provider = Arc::new(ScriptedProvider::answering(&["Bug type: correct"]));
        let test_set = vec![example("// header\ncontract A {} /* done */\n\n", "correct")];

        harness(provider.clone()).evaluate(&test_set, 1).await;

        assert_eq!(provider.prompts()[0], "[]\nClassify:\ncontract A {} \n");
    }

    #[tokio::test]
    async fn comparison_is_exact_string_equality() {
        let provider = Arc::new(ScriptedProvider::answering(&["Bug type: Re-entrancy"]));
        let test_set = vec![example("contract A {}", "Re-entrancy ")];

        let records = harness(provider).evaluate(&test_set, 1).await;

        assert!(!records[0].is_match);
    }

    #[test]
    fn table_lists_rows_and_summary() {
        let report = EvaluationReport::new(
            "gemini",
            vec![
                EvaluationRecord {
                    index: 1,
                    true_label: "TOD".to_string(),
                    predicted_label: "Bug type: TOD".to_string(),
                    is_match: true,
                },
                EvaluationRecord {
                    index: 2,
                    true_label: "correct".to_string(),
                    predicted_label: "Bug type: UNKNOWN".to_string(),
                    is_match: false,
                },
            ],
        );

        let table = report.render_table();
        assert!(table.contains(" 1 | TOD                   | Bug type: TOD         | ✔\n"));
        assert!(table.contains(" 2 | correct               | Bug type: UNKNOWN     | ✘\n"));
        assert!(table.ends_with("1/2 matched (50.0%)\n"));
        assert_eq!(report.matched, 1);
    }

    #[test]
    fn empty_report_has_zero_accuracy() {
        let report = EvaluationReport::new("gemini", Vec::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.accuracy, 0.0);
    }
}
