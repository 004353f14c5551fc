//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! The `complete` method is `async fn` on the enum so callers need no
//! trait-object machinery.

pub mod providers;

use serde::Serialize;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Structured-output request: the reply must be a JSON document matching
/// `schema`.
#[derive(Debug, Clone)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: serde_json::Value,
}

/// Token usage reported by the provider for one round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_input_tokens: u64,
}

/// Text reply plus optional usage accounting.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `messages` to the provider and return its reply.
    ///
    /// When `format` is set the provider is asked for structured JSON output.
    pub async fn complete(
        &self,
        messages: &[Message],
        format: Option<&JsonSchemaFormat>,
    ) -> Result<LlmResponse, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(messages, format).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(messages, format).await,
        }
    }

    /// Reachability probe. Always succeeds for the dummy backend.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        match self {
            LlmProvider::Dummy(_) => Ok(()),
            LlmProvider::OpenAiCompatible(p) => p.ping().await,
        }
    }

    /// Short backend name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::OpenAiCompatible(_) => "openai",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(serde_json::to_value(Role::System).unwrap(), "system");
    }

    #[tokio::test]
    async fn dummy_ping_always_ok() {
        let p = LlmProvider::Dummy(providers::dummy::DummyProvider::default());
        assert!(p.ping().await.is_ok());
        assert_eq!(p.name(), "dummy");
    }
}
