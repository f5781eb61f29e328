
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{Embedder, Generator};
use crate::config::ProviderConfig;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Client for OpenAI-compatible `/embeddings` and `/chat/completions` endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: Option<String>,
    embedding_model: String,
    chat_model: String,
    temperature: f32,
    agent: ureq::Agent,
    accept_invalid_certs: bool,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

/// Build a `ureq` agent with a global timeout, optionally skipping TLS verification
#[inline]
pub fn build_agent(timeout: Duration, accept_invalid_certs: bool) -> ureq::Agent {
    let tls_config = ureq::tls::TlsConfig::builder()
        .disable_verification(accept_invalid_certs)
        .build();

    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .tls_config(tls_config)
        .build()
        .into()
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config
            .url()
            .context("Failed to build provider URL from config")?;

        if config.accept_invalid_certs {
            warn!(
                "TLS certificate verification is disabled for {}; responses travel over an unauthenticated channel",
                base_url
            );
        }

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            temperature: config.temperature,
            agent: build_agent(
                Duration::from_secs(config.timeout_seconds),
                config.accept_invalid_certs,
            ),
            accept_invalid_certs: config.accept_invalid_certs,
            retry_attempts: config.retry_attempts.max(1),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout, self.accept_invalid_certs);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Check that the endpoint answers and both configured models are listed
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for provider at {}", self.base_url);

        let models = self.list_models().context("Failed to list models")?;
        for model in [&self.embedding_model, &self.chat_model] {
            if !models.iter().any(|m| &m.id == model) {
                let available: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
                warn!("Model {} not found. Available models: {:?}", model, available);
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    model,
                    available
                ));
            }
        }

        info!(
            "Health check passed for {} with models {} and {}",
            self.base_url, self.embedding_model, self.chat_model
        );
        Ok(())
    }

    /// List all models served by the endpoint
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("models")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.authorized(self.agent.get(url.as_str()))
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.data.len());
        Ok(models_response.data)
    }

    /// Generate embeddings for `texts` in a single request, keeping input order.
    /// Callers size the batch.
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());
        let embeddings = self
            .generate_embeddings_single_batch(texts)
            .with_context(|| format!("Failed to process batch of {} texts", texts.len()))?;

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    fn generate_embeddings_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };

        let url = self
            .base_url
            .join("embeddings")
            .context("Failed to build embedding URL")?;

        let request_json = serde_json::to_string(&request)
            .context("Failed to serialize embedding request")?;

        let response_text = self
            .make_request_with_retry(|| {
                self.authorized(self.agent.post(url.as_str()))
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embeddings")?;

        let mut response: EmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        // Providers may answer out of order; `index` ties each vector to its input
        if response.data.iter().all(|d| d.index.is_some()) {
            response.data.sort_by_key(|d| d.index);
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Single chat completion with a system and a user message
    #[inline]
    pub fn chat_completion(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let url = self
            .base_url
            .join("chat/completions")
            .context("Failed to build chat URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Requesting chat completion from {} (prompt length: {})",
            self.chat_model,
            prompt.len()
        );

        let response_text = self
            .make_request_with_retry(|| {
                self.authorized(self.agent.post(url.as_str()))
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate chat completion")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat response contained no message content"))
    }

    fn authorized<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
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

impl Embedder for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.generate_embeddings_batch(texts)
    }
}

impl Generator for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat_completion(system, prompt)
    }
}
