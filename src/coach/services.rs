use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use super::types::{EvaluationMetrics, Persona, ProductContext};
use crate::call::{CallOutcome, TranscriptMessage};

/// Builds a product context from a web page and/or pasted text
#[async_trait]
pub trait ProductExtractionService: Send + Sync {
    async fn extract(&self, url: Option<&str>, manual_text: Option<&str>) -> Result<ProductContext>;
}

/// Proposes customer personas for a product
#[async_trait]
pub trait PersonaService: Send + Sync {
    async fn generate_personas(&self, product: &ProductContext) -> Result<Vec<Persona>>;
}

/// Scores a finished call
#[async_trait]
pub trait EvaluationService: Send + Sync {
    async fn evaluate(
        &self,
        transcript: &[TranscriptMessage],
        product: &ProductContext,
        persona: &Persona,
    ) -> Result<EvaluationMetrics>;
}

/// Hand a finished call's transcript to the evaluator
pub async fn evaluate_call(
    service: &dyn EvaluationService,
    outcome: &CallOutcome,
    product: &ProductContext,
    persona: &Persona,
) -> Result<EvaluationMetrics> {
    if outcome.transcript.is_empty() {
        bail!("Call {} has no transcript to evaluate", outcome.session_id);
    }

    info!(
        "Evaluating call {} ({} messages)",
        outcome.session_id,
        outcome.transcript.len()
    );
    service.evaluate(&outcome.transcript, product, persona).await
}
