//! Final synthesis of partial summaries

use std::sync::Arc;

use tracing::debug;

use super::{prompts, SummaryFocus};
use crate::config::ModelConfig;
use crate::inference::{InferenceClient, InferenceError, InferenceRequest};

/// Folds ordered partial summaries into one narrative
///
/// Empty entries are gaps left by skipped chunks and carry no content.
pub trait Reducer: Send + Sync {
    fn reduce(&self, entity: &str, partials: &[String]) -> Result<String, InferenceError>;
}

/// Label each non-empty partial with its 1-based position in the document
pub fn label_partials(partials: &[String]) -> String {
    partials
        .iter()
        .enumerate()
        .filter(|(_, summary)| !summary.trim().is_empty())
        .map(|(i, summary)| format!("Summary of Part {}:\n{}", i + 1, summary))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Reducer that asks the model for one synthesized report
pub struct SynthesisReducer {
    client: Arc<dyn InferenceClient>,
    focus: SummaryFocus,
    temperature: f32,
    max_tokens: u32,
}

impl SynthesisReducer {
    pub fn new(client: Arc<dyn InferenceClient>, model: &ModelConfig, focus: SummaryFocus) -> Self {
        Self {
            client,
            focus,
            temperature: model.temperature,
            max_tokens: model.reduce_max_tokens,
        }
    }
}

impl Reducer for SynthesisReducer {
    fn reduce(&self, entity: &str, partials: &[String]) -> Result<String, InferenceError> {
        let mut present = partials.iter().filter(|s| !s.trim().is_empty());
        match (present.next(), present.next()) {
            (None, _) => Err(InferenceError::Empty),
            // Nothing to synthesize
            (Some(only), None) => {
                debug!(entity, "single partial summary, skipping synthesis");
                Ok(only.clone())
            }
            _ => {
                let prompt =
                    prompts::synthesis_prompt(entity, &label_partials(partials), self.focus);
                self.client.infer(&InferenceRequest {
                    prompt: &prompt,
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                })
            }
        }
    }
}
