use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use diagrammer_core::AiSettings;

use crate::error::LlmError;
use crate::prompt;

pub const PROVIDERS: [&str; 7] = [
    "openai",
    "anthropic",
    "google",
    "ollama",
    "groq",
    "mistral",
    "deepseek",
];

/// Raw text of one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
}

/// The single call the pipeline makes to a model. Implementations carry no
/// per-request state and may be shared across requests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Completion, LlmError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, LlmError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(LlmError::UnknownProvider(other.to_string())),
    }
}

/// Options for [`LlmEngine`] beyond what is stored in the settings file.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
}

/// [`LlmProvider`] backed by the `llm` crate.
#[derive(Debug, Clone)]
pub struct LlmEngine {
    settings: AiSettings,
    options: EngineOptions,
    system: String,
}

impl LlmEngine {
    /// Fails early on an unknown provider so a bad configuration never
    /// reaches the retry loop.
    pub fn new(settings: AiSettings, options: EngineOptions) -> Result<Self, LlmError> {
        map_backend(&settings.provider)?;
        Ok(Self {
            settings,
            options,
            system: prompt::system_prompt(),
        })
    }
}

#[async_trait]
impl LlmProvider for LlmEngine {
    async fn generate(&self, prompt: &str) -> Result<Completion, LlmError> {
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(&self.system);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }
        if let Some(secs) = self.options.timeout_secs {
            builder = builder.timeout_seconds(secs);
        }
        if let Some(t) = self.options.temperature {
            builder = builder.temperature(t);
        }

        let llm = builder.build().map_err(|e| LlmError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(prompt).build()];

        log::debug!(
            provider = self.settings.provider.as_str(),
            model = self.settings.model.as_str();
            "Sending prompt"
        );
        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| LlmError::Chat(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => {
                log::trace!(chars = text.len(); "Raw LLM output:\n{text}");
                Ok(Completion { content: text })
            }
            _ => Err(LlmError::EmptyResponse),
        }
    }
}
