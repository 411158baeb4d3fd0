use crate::error::LlmError;
use crate::schema::strict_schema;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// JSON schema a structured response must satisfy
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn of<T: JsonSchema>() -> Self {
        Self {
            name: T::schema_name(),
            schema: strict_schema::<T>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub schema: Option<ResponseSchema>,
}

impl CompletionRequest {
    /// Request with no schema attached
    #[cfg(test)]
    pub(crate) fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            schema: None,
        }
    }

    /// Request constrained to the JSON schema of `T`
    pub fn structured<T: JsonSchema>(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            schema: Some(ResponseSchema::of::<T>()),
        }
    }
}

/// A hosted or local text-generation service.
///
/// Implementations return the raw completion text; schema parsing happens in
/// [`crate::Generator`].
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
    format: serde_json::Value, // "json" or a JSON schema
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub const DEFAULT_URL: &'static str = "http://localhost:11434";

    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(Self::DEFAULT_URL.to_string(), "llama3".to_string())
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let format = match &request.schema {
            Some(schema) => schema.schema.clone(),
            None => serde_json::Value::String("json".to_string()),
        };

        let body = OllamaRequest {
            model: self.model.clone(),
            prompt: request.user.clone(),
            system: request.system.clone(),
            stream: false,
            format,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            LlmError::NoStructuredResponse(format!("Failed to parse Ollama response: {}", e))
        })?;

        debug!(model = %self.model, chars = ollama_response.response.len(), "Ollama completion");

        Ok(ollama_response.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiClient {
    pub const DEFAULT_URL: &'static str = "https://api.openai.com/v1";

    /// `api_key` falls back to `OPENAI_API_KEY` at request time
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            base_url,
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> Result<String, LlmError> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| LlmError::Config("OPENAI_API_KEY not set".into()))
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: 0.0,
            response_format: request.schema.as_ref().map(|schema| ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &schema.name,
                    strict: true,
                    schema: &schema.schema,
                },
            }),
        };

        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::NoStructuredResponse(e.to_string()))?;

        let message = chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::NoStructuredResponse("response had no choices".into()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "OpenAI chat completion"
        );

        match (message.content, message.refusal) {
            (Some(content), _) => Ok(content),
            (None, Some(refusal)) => Err(LlmError::NoStructuredResponse(format!(
                "model refused: {}",
                refusal
            ))),
            (None, None) => Err(LlmError::NoStructuredResponse(
                "response had no content".into(),
            )),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DecontextualizedSentence;

    #[test]
    fn test_structured_request_carries_schema() {
        let request = CompletionRequest::structured::<DecontextualizedSentence>("sys", "user");
        let schema = request.schema.unwrap();

        assert_eq!(schema.name, "DecontextualizedSentence");
        assert_eq!(schema.schema["type"], "object");
    }

    #[test]
    fn test_text_request_has_no_schema() {
        assert!(CompletionRequest::text("sys", "user").schema.is_none());
    }

    #[tokio::test]
    async fn test_openai_without_key_is_config_error() {
        let client = OpenAiClient::new(
            "http://127.0.0.1:9".to_string(),
            "gpt-4o-mini".to_string(),
            Some(String::new()),
        );
        // An explicit empty key does not fall back to the environment
        let err = client
            .complete(&CompletionRequest::text("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));
    }
}
