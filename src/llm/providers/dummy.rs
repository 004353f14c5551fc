//! Dummy LLM provider. Returns a canned reply, or echoes the last user
//! message prefixed with `[echo]` when none is configured.
//! Used for running the full turn pipeline without a real API key.

use std::sync::{Arc, Mutex};

use crate::llm::{JsonSchemaFormat, LlmResponse, Message, ProviderError, Role};

#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    reply: Option<String>,
    /// Messages of the most recent request. Shared between clones.
    last_request: Arc<Mutex<Option<Vec<Message>>>>,
}

impl DummyProvider {
    pub fn new(reply: Option<String>) -> Self {
        Self { reply, last_request: Arc::default() }
    }

    /// Provider that answers every request with `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self::new(Some(reply.into()))
    }

    /// The messages passed to the most recent `complete` call.
    pub fn last_request(&self) -> Option<Vec<Message>> {
        self.last_request.lock().ok().and_then(|g| g.clone())
    }

    pub async fn complete(
        &self,
        messages: &[Message],
        _format: Option<&JsonSchemaFormat>,
    ) -> Result<LlmResponse, ProviderError> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(messages.to_vec());
        }
        let text = match &self.reply {
            Some(reply) => reply.clone(),
            None => {
                let last = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                format!("[echo] {last}")
            }
        };
        Ok(LlmResponse { text, usage: None })
    }
}
