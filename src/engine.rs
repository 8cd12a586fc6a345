use async_trait::async_trait;

use crate::types::{ClassificationRequest, ClassificationResult};

/// A classification backend.
///
/// Implementations never fail: errors are folded into the returned
/// [`ClassificationResult`] so every caller sees the same shape.
#[async_trait]
pub trait Engine {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult;
}
