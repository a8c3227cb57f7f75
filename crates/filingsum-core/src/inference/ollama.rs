//! Ollama chat endpoint client

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{normalize_reply, InferenceClient, InferenceError, InferenceRequest};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Reply shapes of both the chat (`message.content`) and generate
/// (`response`) endpoints
#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for a local Ollama server
pub struct OllamaClient {
    agent: ureq::Agent,
    url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, error: ureq::Error) -> InferenceError {
        match error {
            ureq::Error::Timeout(_) => InferenceError::Timeout(self.timeout),
            other => InferenceError::Unavailable {
                url: self.url.clone(),
                reason: other.to_string(),
            },
        }
    }
}

impl InferenceClient for OllamaClient {
    fn infer(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: request.prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };
        let payload = serde_json::to_string(&body)
            .map_err(|e| InferenceError::Malformed(format!("cannot encode request: {e}")))?;

        trace!(model = %self.model, prompt_chars = request.prompt.len(), "ollama_request");
        let mut response = self
            .agent
            .post(&self.url)
            .header("Content-Type", "application/json")
            .send(payload.as_str())
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| self.transport_error(e))?;
        debug!(status, bytes = text.len(), "ollama_response");

        if !(200..300).contains(&status) {
            return Err(InferenceError::Status {
                status,
                body: truncate(&text, 200),
            });
        }
        parse_reply(&text)
    }
}

/// Extract the generated text from either reply shape
fn parse_reply(body: &str) -> Result<String, InferenceError> {
    let reply: ChatReply =
        serde_json::from_str(body).map_err(|e| InferenceError::Malformed(e.to_string()))?;

    if let Some(error) = reply.error {
        return Err(InferenceError::Malformed(error));
    }

    match (reply.message.and_then(|m| m.content), reply.response) {
        (Some(content), _) | (None, Some(content)) => normalize_reply(&content),
        (None, None) => Err(InferenceError::Malformed(
            "reply has neither message.content nor response".to_string(),
        )),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_reply() {
        let body = r#"{"model":"llama3","message":{"role":"assistant","content":" Revenue grew. "},"done":true}"#;
        assert_eq!(parse_reply(body).unwrap(), "Revenue grew.");
    }

    #[test]
    fn test_parse_generate_reply() {
        let body = r#"{"model":"llama3","response":"Margins fell.","done":true}"#;
        assert_eq!(parse_reply(body).unwrap(), "Margins fell.");
    }

    #[test]
    fn test_parse_reply_without_text_is_malformed() {
        let err = parse_reply(r#"{"done":true}"#).unwrap_err();
        assert!(matches!(err, InferenceError::Malformed(_)));

        let err = parse_reply("not json").unwrap_err();
        assert!(matches!(err, InferenceError::Malformed(_)));
    }

    #[test]
    fn test_parse_reply_error_field() {
        let err = parse_reply(r#"{"error":"model 'x' not found"}"#).unwrap_err();
        assert_eq!(err, InferenceError::Malformed("model 'x' not found".into()));
    }

    #[test]
    fn test_parse_empty_content() {
        let body = r#"{"message":{"role":"assistant","content":"   "}}"#;
        assert_eq!(parse_reply(body), Err(InferenceError::Empty));
    }

    #[test]
    fn test_url_normalization() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3", Duration::from_secs(1));
        assert_eq!(client.url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        // Port 9 (discard) is closed on test machines
        let client = OllamaClient::new("http://127.0.0.1:9", "llama3", Duration::from_secs(2));
        let request = InferenceRequest {
            prompt: "hello",
            temperature: 0.0,
            max_tokens: 10,
        };
        let err = client.infer(&request).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::Unavailable { .. } | InferenceError::Timeout(_)
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
