use super::{check_status, AiClient, TEMPERATURE};
use crate::error::AiError;
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    temperature: f64,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: TEMPERATURE,
            },
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
            "gemini-2.0-flash-exp".to_string(),
        ]
    }
}

/// The response text is expected to be strict JSON because of
/// `responseMimeType`; it is parsed as-is.
fn parse_body(body: &str) -> Result<Value, AiError> {
    let provider = Provider::Gemini;
    let response: GeminiResponse =
        serde_json::from_str(body).map_err(|e| AiError::decode(provider, e.to_string()))?;

    let first = response.candidates.and_then(|c| c.into_iter().next());
    if let Some(candidate) = &first {
        if candidate.content.is_none() {
            log::warn!(
                "gemini returned no content, finish reason {}",
                candidate.finish_reason.as_deref().unwrap_or("UNKNOWN")
            );
        }
    }

    let text: String = first
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse { provider });
    }

    serde_json::from_str(&text).map_err(|e| AiError::decode(provider, e.to_string()))
}

#[async_trait]
impl AiClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, prompt: &str) -> Result<Value, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(AiError::transport(Provider::Gemini))?;

        let response = check_status(Provider::Gemini, response).await?;
        let body = response
            .text()
            .await
            .map_err(AiError::transport(Provider::Gemini))?;

        parse_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_server;
    use serde_json::json;

    #[test]
    fn test_request_carries_json_mime_type_and_temperature() {
        let client = GeminiClient::new("k", "gemini-2.5-flash");
        let body = serde_json::to_value(client.build_request("hi")).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "generationConfig": {"responseMimeType": "application/json", "temperature": 0.8}
            })
        );
    }

    #[test]
    fn test_parse_success() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "{\"analysis_summary\":\"a\",\"final_script\":\"b\"}"}],
                    "role": "model"
                },
                "finishReason": "STOP",
                "index": 0
            }]
        }"#;
        let value = parse_body(body).unwrap();
        assert_eq!(value["final_script"], "b");
    }

    #[test]
    fn test_safety_block_is_empty_response() {
        let body = r#"{"candidates": [{"finishReason": "SAFETY", "index": 0}]}"#;
        let err = parse_body(body).unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse { provider: Provider::Gemini }));
    }

    #[test]
    fn test_missing_parts_is_empty_response() {
        let body = r#"{"candidates": [{"content": {"role": "model"}, "finishReason": "STOP"}]}"#;
        assert!(matches!(parse_body(body).unwrap_err(), AiError::EmptyResponse { .. }));
        assert!(matches!(parse_body("{}").unwrap_err(), AiError::EmptyResponse { .. }));
    }

    #[test]
    fn test_non_json_text_is_decode_error() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "```json\n{}\n```"}]}}]}"#;
        assert!(matches!(parse_body(body).unwrap_err(), AiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_rejected_key_is_http_error() {
        let (base_url, server) = test_server::reject_once().await;
        let client = GeminiClient::new("g-key", "gemini-2.5-flash").with_base_url(&base_url);

        let err = client.complete_json("hi").await.unwrap_err();
        let request = server.await.unwrap();

        assert_eq!(
            request.request_line,
            "POST /v1beta/models/gemini-2.5-flash:generateContent HTTP/1.1"
        );
        assert_eq!(request.header("x-goog-api-key"), Some("g-key"));
        assert!(!request.request_line.contains("key="));
        let sent: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(sent["generationConfig"]["responseMimeType"], "application/json");

        assert!(matches!(
            err,
            AiError::Http { provider: Provider::Gemini, status: 401, ref reason, .. } if reason == "Unauthorized"
        ));
        assert!(err.to_string().contains("401 Unauthorized"));
    }
}
