use crate::config::{parse_oracle_provider_model, OracleConfig};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Which OpenAI-compatible service the oracle model string points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleBackend {
    Groq,
    OpenAI,
    OpenRouter,
    Ollama,
    Compatible { base_url: String },
    Unavailable { reason: String },
}

impl OracleBackend {
    pub fn detect(config: &OracleConfig) -> Self {
        let (provider, _model) = parse_oracle_provider_model(&config.model);

        match provider.to_lowercase().as_str() {
            "groq" => OracleBackend::Groq,
            "openai" => OracleBackend::OpenAI,
            "openrouter" => OracleBackend::OpenRouter,
            "ollama" => OracleBackend::Ollama,
            _ => {
                if let Some(base_url) = &config.base_url {
                    OracleBackend::Compatible {
                        base_url: base_url.clone(),
                    }
                } else {
                    OracleBackend::Unavailable {
                        reason: format!(
                            "Unknown provider in model '{}' and no ORACLE_BASE_URL set",
                            config.model
                        ),
                    }
                }
            }
        }
    }

    /// Default base URL for the backend; an explicit config URL wins.
    pub fn default_base_url(&self) -> Option<&str> {
        match self {
            OracleBackend::Groq => Some(GROQ_BASE_URL),
            OracleBackend::OpenAI => Some(OPENAI_BASE_URL),
            OracleBackend::OpenRouter => Some(OPENROUTER_BASE_URL),
            OracleBackend::Ollama => Some(OLLAMA_BASE_URL),
            OracleBackend::Compatible { base_url } => Some(base_url),
            OracleBackend::Unavailable { .. } => None,
        }
    }

    /// Ollama serves locally without credentials; everything else needs one.
    pub fn requires_api_key(&self) -> bool {
        !matches!(
            self,
            OracleBackend::Ollama | OracleBackend::Unavailable { .. }
        )
    }
}
