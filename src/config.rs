use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, KoyuError};

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub terminology: TerminologyConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// Primary model for detection and translation
    pub model: String,
    /// Model retried once when the primary call fails
    pub fallback_model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request deadline in seconds; a timeout counts as a primary failure
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminologyConfig {
    /// Directory holding one CSV sheet per language (e.g. en-US.csv)
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for per-language artifacts (term logs, descriptions, transcripts)
    pub dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "qwen2.5:7b".to_string(),
                fallback_model: "llama3.1:8b".to_string(),
                temperature: 0.3,
                timeout_secs: 300,
            },
            terminology: TerminologyConfig {
                dir: "terminology".to_string(),
            },
            output: OutputConfig {
                dir: "results".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KoyuError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| KoyuError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KoyuError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| KoyuError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Load from the given path, or from ./config.toml when present, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new("config.toml");
                if local.exists() {
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
