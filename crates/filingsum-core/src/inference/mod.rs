//! Language model access
//!
//! The pipeline talks to the model only through [`InferenceClient`]: one
//! blocking prompt-in, text-out exchange per call, with no retries at this
//! layer. Two back ends ship with the crate:
//! - [`OllamaClient`]: the Ollama HTTP chat endpoint
//! - [`CommandClient`]: a fresh child process per call, prompt on stdin

mod command;
mod ollama;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ModelConfig;
use crate::error::{FilingError, Result};

pub use command::CommandClient;
pub use ollama::OllamaClient;

/// Which inference back end to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ollama,
    Command,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Ollama => "ollama",
            Backend::Command => "command",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Backend::Ollama),
            "command" => Ok(Backend::Command),
            other => Err(FilingError::invalid_value("backend", other)),
        }
    }
}

/// Failure of a single inference call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("inference service at {url} unavailable: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("inference call timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("empty response")]
    Empty,

    #[error("inference command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
}

/// One prompt and its generation limits
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A blocking connection to a language model
pub trait InferenceClient: Send + Sync {
    /// Generate a reply for one prompt.
    ///
    /// Never panics on a bad reply; malformed or empty output is an error.
    fn infer(&self, request: &InferenceRequest<'_>) -> std::result::Result<String, InferenceError>;
}

/// Build the client selected by the model configuration
pub fn client_from_config(config: &ModelConfig) -> Result<Arc<dyn InferenceClient>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.backend {
        Backend::Ollama => Ok(Arc::new(OllamaClient::new(
            &config.base_url,
            &config.name,
            timeout,
        ))),
        Backend::Command => Ok(Arc::new(CommandClient::new(config.command.clone(), timeout)?)),
    }
}

/// Trim the reply and reject whitespace-only output
pub(crate) fn normalize_reply(reply: &str) -> std::result::Result<String, InferenceError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        Err(InferenceError::Empty)
    } else {
        Ok(trimmed.to_string())
    }
}
