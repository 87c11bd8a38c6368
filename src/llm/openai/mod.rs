#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::llm::{ChatMessage, ToolSpec};

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const EMBED_BATCH_SIZE: usize = 64;

/// Client for an OpenAI-compatible provider covering the three model
/// capabilities the application needs: chat completion with tool calling,
/// short-text summarization, and text embedding.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Url::parse(&config.provider.base_url)
            .with_context(|| format!("Invalid provider base URL: {}", config.provider.base_url))?;

        let api_key = config
            .api_key()
            .context("Failed to resolve provider API key")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url: config.provider.base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model: config.provider.chat_model.clone(),
            embedding_model: config.provider.embedding_model.clone(),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// One chat-completion round. The returned message either carries final
    /// content or one or more tool calls for the caller to satisfy.
    pub fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        debug!(
            "Requesting chat completion ({} messages, {} tools)",
            messages.len(),
            tools.len()
        );

        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
            tools: tools.iter().map(ToolSpec::to_wire).collect(),
            response_format: None,
        };

        self.send_chat_request(&request)
    }

    /// Chat completion constrained to a JSON object response. Returns the raw
    /// JSON text for the caller to parse against its own schema.
    pub fn chat_json(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            "Requesting JSON chat completion ({} messages)",
            messages.len()
        );

        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
            tools: Vec::new(),
            response_format: Some(serde_json::json!({"type": "json_object"})),
        };

        let message = self.send_chat_request(&request)?;
        Ok(message.text().to_string())
    }

    /// Single-prompt convenience wrapper around [`Self::chat`].
    pub fn complete(&self, prompt: &str) -> Result<String> {
        let messages = [ChatMessage::user(prompt)];
        let message = self.chat(&messages, &[])?;
        Ok(message.text().to_string())
    }

    /// Generate a short self-contained summary of a passage in the given
    /// language.
    pub fn summarize(&self, text: &str, language: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(
                "You write short, self-contained summaries of study material passages.",
            ),
            ChatMessage::user(format!(
                "Summarize the following passage in {language}. Use two or three \
                 sentences and keep the passage's own terminology.\n\n{text}"
            )),
        ];

        let message = self.chat(&messages, &[])?;
        let summary = message.text().trim().to_string();
        if summary.is_empty() {
            return Err(anyhow::anyhow!("Provider returned an empty summary"));
        }
        Ok(summary)
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut embeddings = self.embed_inputs(&input)?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Provider returned no embedding"))
    }

    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let batch_results = self
                .embed_inputs(batch)
                .with_context(|| format!("Failed to embed batch of {} texts", batch.len()))?;
            results.extend(batch_results);
        }

        Ok(results)
    }

    fn embed_inputs(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embeddings request")?;

        let response_text = self
            .post_json("embeddings", &request_json)
            .context("Failed to generate embeddings")?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embeddings response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        let mut data = response.data;
        data.sort_by_key(|entry| entry.index);
        Ok(data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn send_chat_request(&self, request: &ChatCompletionRequest<'_>) -> Result<ChatMessage> {
        let request_json = serde_json::to_string(request)
            .context("Failed to serialize chat completion request")?;

        let response_text = self
            .post_json("chat/completions", &request_json)
            .context("Failed to request chat completion")?;

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow::anyhow!("Chat completion response contained no choices"))
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        let authorization = format!("Bearer {}", self.api_key);

        self.make_request_with_retry(|| {
            self.agent
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", &authorization)
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}
