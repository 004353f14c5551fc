//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! All OpenAI wire types are private to this module; callers only see
//! [`LlmResponse`]. Structured output is requested through
//! `response_format: { type: "json_schema", ... }` with `strict: true`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::{JsonSchemaFormat, LlmResponse, LlmUsage, Message, ProviderError};

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// When `api_key` is present it is sent as `Authorization: Bearer <key>`.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, temperature, api_key })
    }

    /// Lightweight reachability probe.
    ///
    /// Any HTTP response (including 4xx) means the server is reachable. Only a
    /// transport-level failure is treated as unreachable. Hard 5-second timeout.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build ping client: {e}")))?;
        let mut req = client.head(&self.api_base_url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req.send()
            .await
            .map(|_| ())
            .map_err(|e| ProviderError::Request(format!("unreachable: {e}")))
    }

    /// One chat-completion round-trip.
    pub async fn complete(
        &self,
        messages: &[Message],
        format: Option<&JsonSchemaFormat>,
    ) -> Result<LlmResponse, ProviderError> {
        // gpt-5 family models reject a temperature parameter.
        let temperature = if self.model.starts_with("gpt-5") {
            None
        } else {
            Some(self.temperature)
        };

        let payload = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            response_format: format.map(|f| ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaSpec { name: &f.name, strict: true, schema: &f.schema },
            }),
        };

        debug!(
            model = %payload.model,
            temperature = ?payload.temperature,
            messages = messages.len(),
            structured = format.is_some(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, timeout = e.is_timeout(), "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received LLM response");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&parsed)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(response = %json, "full LLM response payload");
        }

        let usage = parsed.usage.as_ref().map(|u| LlmUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            cached_input_tokens: u.prompt_tokens_details.as_ref().map(|d| d.cached_tokens).unwrap_or(0),
        });

        let choice = parsed.choices.into_iter().next();
        if let Some(refusal) = choice.as_ref().and_then(|c| c.message.refusal.clone()) {
            return Err(ProviderError::Request(format!("model refused: {refusal}")));
        }

        let text = choice
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))?;

        Ok(LlmResponse { text, usage })
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaSpec<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaSpec<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsageData {
    prompt_tokens: u64,
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = describe_error(status, &body);
    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_strict_schema() {
        let schema = json!({ "type": "object" });
        let format = JsonSchemaFormat { name: "extraction".into(), schema: schema.clone() };
        let messages = [Message::system("s"), Message::user("u")];
        let req = ChatCompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: Some(0.0),
            response_format: Some(ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaSpec { name: &format.name, strict: true, schema: &format.schema },
            }),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["response_format"]["type"], "json_schema");
        assert_eq!(v["response_format"]["json_schema"]["strict"], true);
        assert_eq!(v["response_format"]["json_schema"]["schema"], schema);
        assert_eq!(v["messages"][0]["role"], "system");
    }

    #[test]
    fn plain_request_omits_optional_fields() {
        let req = ChatCompletionRequest { model: "gpt-5", messages: &[], temperature: None, response_format: None };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("temperature").is_none());
        assert!(v.get("response_format").is_none());
    }

    #[test]
    fn error_envelope_is_described() {
        let body = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        let msg = describe_error(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(msg.contains("401"));
        assert!(msg.contains("[code=invalid_api_key]"));
        assert!(msg.contains("bad key"));
    }

    #[test]
    fn raw_error_body_is_kept() {
        let msg = describe_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(msg.ends_with("upstream down"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        let p = OpenAiCompatibleProvider::new(
            "http://127.0.0.1:9/v1/chat/completions".into(),
            "test".into(),
            0.0,
            1,
            None,
        )
        .unwrap();
        let err = p.complete(&[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
    }
}
