//! HTTP client for OpenAI-compatible chat-completions APIs.
//!
//! Works against `OpenAI`, `DeepSeek`, and Ollama endpoints: the
//! backend does not care which model answers, it sends a prompt and
//! expects text back. The [`CompletionApi`] trait exists so tests can
//! substitute failing, slow, or counting stubs for the real client.

use arena_core::config::LlmConfig;

use crate::error::LlmError;

/// One rendered prompt plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Anything that can answer a chat request with text.
pub trait CompletionApi: Send + Sync {
    /// Send the request and return the assistant's text.
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

/// Production client speaking the chat-completions wire format.
pub struct HttpChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpChatClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

impl CompletionApi for HttpChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unable to read error body"));
            return Err(LlmError::Backend(format!(
                "endpoint returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Backend(format!("response parse failed: {e}")))?;

        extract_content(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
fn extract_content(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            LlmError::Backend(String::from(
                "response missing choices[0].message.content",
            ))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extract_content_valid() {
        let json = serde_json::json!({
            "choices": [{
                "message": {"content": "ACTION: rest\nREASON: tired"}
            }]
        });
        assert!(extract_content(&json).unwrap().contains("ACTION"));
    }

    #[test]
    fn extract_content_missing_choices() {
        let json = serde_json::json!({"error": "rate_limit"});
        assert!(extract_content(&json).is_err());
    }

    #[test]
    fn extract_content_empty_choices() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_content(&json).is_err());
    }
}
