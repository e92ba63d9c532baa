use super::{check_status, extract, AiClient, TEMPERATURE};
use crate::error::AiError;
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeClient {
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

    fn build_request(&self, prompt: &str) -> ClaudeRequest {
        ClaudeRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "claude-3-5-sonnet-20241022".to_string(),
            "claude-sonnet-4-20250514".to_string(),
            "claude-3-5-haiku-20241022".to_string(),
        ]
    }
}

/// Claude answers in free text, so the JSON may be fenced or surrounded by
/// prose. See [`extract::extract_json`].
fn parse_body(body: &str) -> Result<Value, AiError> {
    let provider = Provider::Claude;
    let response: ClaudeResponse =
        serde_json::from_str(body).map_err(|e| AiError::decode(provider, e.to_string()))?;

    let text = response
        .content
        .into_iter()
        .next()
        .map(|c| c.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or(AiError::EmptyResponse { provider })?;

    extract::extract_json(&text).map_err(|e| AiError::decode(provider, e.to_string()))
}

#[async_trait]
impl AiClient for ClaudeClient {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, prompt: &str) -> Result<Value, AiError> {
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(AiError::transport(Provider::Claude))?;

        let response = check_status(Provider::Claude, response).await?;
        let body = response
            .text()
            .await
            .map_err(AiError::transport(Provider::Claude))?;

        parse_body(&body)
    }
}
