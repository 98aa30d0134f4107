use super::Annotator;
use crate::error::LlmError;
use crate::retry::{RetryConfig, RetryPolicy, RunStatistics};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Optional sampling parameters forwarded as `generationConfig`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// Client for the Google Generative Language `generateContent` endpoint
#[derive(Clone)]
pub struct GoogleProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    retry_policy: RetryPolicy,
    generation: GenerationSettings,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Configuration(
                "Google AI API key cannot be empty".to_string(),
            ));
        }

        let model = model.into();
        if model.trim().is_empty() {
            return Err(LlmError::Configuration(
                "model name cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: build_client(DEFAULT_TIMEOUT)?,
            retry_policy: RetryPolicy::new(RetryConfig::default()),
            generation: GenerationSettings::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_policy = RetryPolicy::new(retry_config);
        self
    }

    pub fn with_generation_settings(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    fn api_endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_request(&self, prompt: &str) -> GoogleRequest {
        let generation_config = if self.generation == GenerationSettings::default() {
            None
        } else {
            Some(GoogleGenerationConfig {
                temperature: self.generation.temperature,
                max_output_tokens: self.generation.max_output_tokens,
            })
        };

        GoogleRequest {
            contents: vec![GoogleContent {
                parts: vec![GooglePart {
                    text: prompt.to_string(),
                }],
                role: Some("user".to_string()),
            }],
            generation_config,
        }
    }

    /// One HTTP round trip, no retries.
    async fn generate_once(&self, request: &GoogleRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.api_endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let google_response: GoogleResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to decode response: {e}")))?;

        google_response.into_text()
    }
}

impl fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

fn build_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {e}")))
}

#[async_trait]
impl Annotator for GoogleProvider {
    async fn annotate(&self, prompt: &str, stats: &mut RunStatistics) -> Result<String, LlmError> {
        let start_time = Instant::now();
        let request = self.build_request(prompt);

        debug!(
            "Sending {} prompt chars to Google AI (model: {})",
            prompt.len(),
            self.model
        );

        let text = self
            .retry_policy
            .execute(stats, || self.generate_once(&request))
            .await?;

        info!(
            "Received {} chars from Google AI in {:?}",
            text.len(),
            start_time.elapsed()
        );
        Ok(text)
    }

    fn name(&self) -> String {
        format!("google/{}", self.model)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GoogleGenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleContent {
    parts: Vec<GooglePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct GooglePart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponseContent {
    #[serde(default)]
    parts: Vec<GoogleResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

impl GoogleResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::InvalidResponse(format!(
                "prompt blocked: {reason}"
            )));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no candidates in response".to_string()))?;

        let finish_reason = candidate.finish_reason.unwrap_or_default();
        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse(format!(
                "candidate has no text (finish reason: {finish_reason})"
            )));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = GoogleProvider::new("test-api-key", DEFAULT_MODEL)
            .expect("provider should build");
        assert_eq!(provider.model(), "gemini-2.5-flash");
        assert_eq!(provider.name(), "google/gemini-2.5-flash");
        assert_eq!(provider.retry_policy().config().max_attempts, 5);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = GoogleProvider::new("  ", DEFAULT_MODEL);
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_endpoint_uses_base_url() {
        let provider = GoogleProvider::new("key", "gemini-pro")
            .expect("provider should build")
            .with_base_url("http://localhost:1234/");
        assert_eq!(
            provider.api_endpoint(),
            "http://localhost:1234/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_request_serialization() {
        let provider = GoogleProvider::new("key", DEFAULT_MODEL)
            .expect("provider should build")
            .with_generation_settings(GenerationSettings {
                temperature: Some(0.0),
                max_output_tokens: None,
            });

        let json = serde_json::to_value(provider.build_request("hello"))
            .expect("request serializes");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GoogleResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "ID: 1 | Prob: 0.5\n"}, {"text": "ID: 2 | Prob: 1.0"}], "role": "model"},
                    "finishReason": "STOP"
                }]
            }"#,
        )
        .expect("valid json");

        assert_eq!(
            response.into_text().expect("text present"),
            "ID: 1 | Prob: 0.5\nID: 2 | Prob: 1.0"
        );
    }

    #[test]
    fn test_blocked_prompt_is_invalid_response() {
        let response: GoogleResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)
                .expect("valid json");

        match response.into_text() {
            Err(LlmError::InvalidResponse(message)) => assert!(message.contains("SAFETY")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
