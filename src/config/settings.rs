use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which HTTP dialect the model server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Ollama's native `/api/chat`.
    #[default]
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions` (LM Studio and friends).
    OpenAi,
}

impl Backend {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Backend::Ollama => "http://localhost:11434",
            Backend::OpenAi => "http://localhost:1234",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub backend: Backend,

    /// Server address; the backend's usual local port when unset.
    pub base_url: Option<String>,

    /// Multimodal model used to look at images.
    pub vision_model: String,

    /// Model used for all narrative text.
    pub text_model: String,

    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Ollama,
            base_url: None,
            vision_model: "llava".into(),
            text_model: "llama2".into(),
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

impl Settings {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.backend.default_base_url())
    }
}
