//! Chunk summarization and final synthesis
//!
//! [`ChunkSummarizer`] turns one chunk into a partial summary with a single
//! inference call. A [`Reducer`] folds the ordered partial summaries into the
//! final narrative.

pub mod prompts;
mod reduce;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::FilingError;
use crate::inference::{InferenceClient, InferenceError, InferenceRequest};

pub use reduce::{label_partials, Reducer, SynthesisReducer};

/// Analytical angle of the generated summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFocus {
    #[default]
    Comprehensive,
    Brief,
    Risks,
    Financial,
}

impl SummaryFocus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryFocus::Comprehensive => "comprehensive",
            SummaryFocus::Brief => "brief",
            SummaryFocus::Risks => "risks",
            SummaryFocus::Financial => "financial",
        }
    }
}

impl fmt::Display for SummaryFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryFocus {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "comprehensive" => Ok(SummaryFocus::Comprehensive),
            "brief" => Ok(SummaryFocus::Brief),
            "risks" => Ok(SummaryFocus::Risks),
            "financial" | "financial_only" => Ok(SummaryFocus::Financial),
            other => Err(FilingError::invalid_value("summary focus", other)),
        }
    }
}

/// Summarizes one chunk at a time
pub struct ChunkSummarizer {
    client: Arc<dyn InferenceClient>,
    focus: SummaryFocus,
    temperature: f32,
    max_tokens: u32,
}

impl ChunkSummarizer {
    pub fn new(client: Arc<dyn InferenceClient>, model: &ModelConfig, focus: SummaryFocus) -> Self {
        Self {
            client,
            focus,
            temperature: model.temperature,
            max_tokens: model.chunk_max_tokens,
        }
    }

    /// Summarize `chunk_text`, refining `prior_context` when given.
    ///
    /// Client failures are returned unchanged.
    pub fn summarize_chunk(
        &self,
        chunk_text: &str,
        entity: &str,
        prior_context: Option<&str>,
    ) -> Result<String, InferenceError> {
        let prompt = match prior_context {
            Some(existing) => prompts::refine_prompt(entity, chunk_text, existing, self.focus),
            None => prompts::map_prompt(entity, chunk_text, self.focus),
        };
        self.client.infer(&InferenceRequest {
            prompt: &prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}
