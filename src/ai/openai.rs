use super::{check_status, AiClient, TEMPERATURE};
use crate::error::AiError;
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    response_format: OpenAIResponseFormat,
    temperature: f64,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIClient {
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

    fn build_request(&self, prompt: &str) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            response_format: OpenAIResponseFormat {
                kind: "json_object".to_string(),
            },
            temperature: TEMPERATURE,
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
        ]
    }
}

fn parse_body(body: &str) -> Result<Value, AiError> {
    let provider = Provider::OpenAI;
    let response: OpenAIResponse =
        serde_json::from_str(body).map_err(|e| AiError::decode(provider, e.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(AiError::EmptyResponse { provider })?;

    serde_json::from_str(&content).map_err(|e| AiError::decode(provider, e.to_string()))
}

#[async_trait]
impl AiClient for OpenAIClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, prompt: &str) -> Result<Value, AiError> {
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(AiError::transport(Provider::OpenAI))?;

        let response = check_status(Provider::OpenAI, response).await?;
        let body = response
            .text()
            .await
            .map_err(AiError::transport(Provider::OpenAI))?;

        parse_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_server;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let client = OpenAIClient::new("sk-test", "gpt-4o");
        let body = serde_json::to_value(client.build_request("hello")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hello"}],
                "response_format": {"type": "json_object"},
                "temperature": 0.8
            })
        );
    }

    #[test]
    fn test_parse_body_reads_first_choice_as_json() {
        let body = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "{\"analysis_summary\":\"a\",\"suggested_topics\":[\"t1\",\"t2\",\"t3\"]}"
                },
                "finish_reason": "stop"
            }]
        }"#;
        let value = parse_body(body).unwrap();
        assert_eq!(value["suggested_topics"][1], "t2");
    }

    #[test]
    fn test_parse_body_without_choices_is_empty_response() {
        let err = parse_body(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse { .. }));

        let err = parse_body(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse { .. }));
    }

    #[test]
    fn test_parse_body_non_json_content_is_decode_error() {
        let body = r#"{"choices": [{"message": {"content": "Sure! Here is your script."}}]}"#;
        assert!(matches!(parse_body(body).unwrap_err(), AiError::Decode { .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAIClient::new("k", "m").with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_rejected_key_is_http_error() {
        let (base_url, server) = test_server::reject_once().await;
        let client = OpenAIClient::new("sk-test", "gpt-4o-mini").with_base_url(&base_url);

        let err = client.complete_json("hello").await.unwrap_err();
        let request = server.await.unwrap();

        assert_eq!(request.request_line, "POST /v1/chat/completions HTTP/1.1");
        assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
        let sent: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(sent["model"], "gpt-4o-mini");
        assert_eq!(sent["response_format"]["type"], "json_object");

        assert!(matches!(
            err,
            AiError::Http { provider: Provider::OpenAI, status: 401, ref reason, .. } if reason == "Unauthorized"
        ));
    }
}
