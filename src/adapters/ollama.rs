use crate::domain::ports::TextGenerator;
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "tinydolphin:latest";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama `/api/generate` 客戶端 (非串流)
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn classify(&self, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::TimeoutError {
                operation: "Ollama generation".to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            EngineError::ConnectionError {
                endpoint: self.base_url.clone(),
                message: e.to_string(),
            }
        } else {
            EngineError::HttpError(e)
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = self.endpoint();
        tracing::debug!("Making Ollama request to: {} (model: {})", url, model);

        let payload = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        tracing::debug!("Ollama response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::LlmStatusError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        let generated = parsed.response.trim();

        tracing::debug!("Ollama raw generated text:\n{}", generated);

        if generated.is_empty() {
            return Err(EngineError::EmptyResponseError {
                model: model.to_string(),
            });
        }

        Ok(generated.to_string())
    }
}
