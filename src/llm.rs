use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{KoyuError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

/// Requested response shape for a generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    fn format_field(self) -> Option<String> {
        match self {
            OutputMode::Text => None,
            OutputMode::Json => Some("json".to_string()),
        }
    }
}

/// Text generation seam used by the detector and translator
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the prompt, retrying once on the fallback
    /// model when the primary fails. Both failing is a hard error.
    async fn generate(&self, prompt: &str, mode: OutputMode) -> Result<String>;
}

/// Ollama-backed generator with the primary/fallback retry policy
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");

        Self { client, config }
    }

    async fn generate_once(&self, model: &str, prompt: &str, mode: OutputMode) -> Result<String> {
        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            format: mode.format_field(),
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        debug!("Sending generation request to {} (model: {})", url, model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| KoyuError::Generation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(KoyuError::Generation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| KoyuError::Generation(format!("Failed to parse response: {}", e)))?;

        let text = generate_response.response.trim().to_string();
        if text.is_empty() {
            return Err(KoyuError::Generation(format!(
                "Empty response from model '{}'",
                model
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, mode: OutputMode) -> Result<String> {
        match self.generate_once(&self.config.model, prompt, mode).await {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                warn!(
                    "Primary model '{}' failed ({}), retrying with '{}'",
                    self.config.model, primary_err, self.config.fallback_model
                );
                self.generate_once(&self.config.fallback_model, prompt, mode)
                    .await
                    .map_err(|fallback_err| {
                        KoyuError::Generation(format!(
                            "Primary model failed: {}; fallback model failed: {}",
                            primary_err, fallback_err
                        ))
                    })
            }
        }
    }
}

/// Check that the endpoint is reachable and has the model loaded
pub async fn check_model_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint);

    let request = json!({
        "name": model
    });

    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| KoyuError::Generation(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(KoyuError::Generation(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_field_only_set_for_json() {
        assert_eq!(OutputMode::Text.format_field(), None);
        assert_eq!(OutputMode::Json.format_field(), Some("json".to_string()));
    }

    #[test]
    fn test_request_omits_absent_format() {
        let request = GenerateRequest {
            model: "qwen2.5:7b".to_string(),
            prompt: "hello".to_string(),
            stream: false,
            format: None,
            options: GenerateOptions { temperature: 0.3 },
        };
        let encoded = serde_json::to_string(&request).unwrap();
        assert!(!encoded.contains("\"format\""));

        let request = GenerateRequest {
            format: Some("json".to_string()),
            ..request
        };
        let encoded = serde_json::to_string(&request).unwrap();
        assert!(encoded.contains("\"format\":\"json\""));
    }
}
