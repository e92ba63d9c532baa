pub mod claude;
pub mod extract;
pub mod gemini;
pub mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;

use crate::config::AiConfig;
use crate::error::AiError;
use crate::provider::Provider;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Sampling temperature shared by every provider
pub const TEMPERATURE: f64 = 0.8;

/// One provider behind a uniform contract: send a prompt, get back a JSON
/// value. Callers decode it into the expected result shape with [`invoke`].
#[async_trait]
pub trait AiClient: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    async fn complete_json(&self, prompt: &str) -> Result<Value, AiError>;
}

pub fn create_client(config: &AiConfig) -> Box<dyn AiClient> {
    let api_key = config.effective_api_key();
    let model = config.model_or_default();
    match config.provider {
        Provider::Gemini => Box::new(GeminiClient::new(&api_key, model)),
        Provider::OpenAI => Box::new(OpenAIClient::new(&api_key, model)),
        Provider::Claude => Box::new(ClaudeClient::new(&api_key, model)),
    }
}

/// Run `prompt` through `client` and decode the reply as `T`.
pub async fn invoke<T: DeserializeOwned>(
    client: &dyn AiClient,
    prompt: &str,
) -> Result<T, AiError> {
    log::info!(
        "sending {} char prompt to {} ({})",
        prompt.chars().count(),
        client.provider(),
        client.model()
    );
    let value = client.complete_json(prompt).await?;
    serde_json::from_value(value).map_err(|e| AiError::decode(client.provider(), e.to_string()))
}

/// Read a response body, turning a non-2xx status into [`AiError::Http`].
pub(crate) async fn check_status(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AiError::Http {
        provider,
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        body,
    })
}

/// One-shot HTTP listener for exercising the clients against a local socket.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    pub(crate) struct CapturedRequest {
        pub request_line: String,
        headers: Vec<(String, String)>,
        pub body: String,
    }

    impl CapturedRequest {
        /// Header lookup, case-insensitive on the name
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Accept a single request and answer it with `401 Unauthorized`.
    /// Returns the base URL to point a client at and a handle resolving to
    /// what the client sent.
    pub(crate) async fn reject_once() -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let head_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the request head");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
            let request_line = lines.next().unwrap_or_default().to_string();
            let headers: Vec<(String, String)> = lines
                .filter_map(|l| l.split_once(':'))
                .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
                .collect();

            let length = headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8_lossy(&buf[head_end..]).to_string();

            let reply = "{}";
            let response = format!(
                "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                reply.len(),
                reply
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            CapturedRequest {
                request_line,
                headers,
                body,
            }
        });

        (base_url, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ScriptResult, TopicSuggestion};
    use serde_json::json;

    struct FixedClient(Value);

    #[async_trait]
    impl AiClient for FixedClient {
        fn provider(&self) -> Provider {
            Provider::OpenAI
        }

        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete_json(&self, _prompt: &str) -> Result<Value, AiError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_invoke_decodes_expected_shape() {
        let client = FixedClient(json!({
            "analysis_summary": "a",
            "suggested_topics": ["t1", "t2", "t3"]
        }));
        let result: TopicSuggestion = invoke(&client, "p").await.unwrap();
        assert_eq!(result.suggested_topics, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_invoke_missing_key_is_decode_error() {
        let client = FixedClient(json!({"analysis_summary": "a"}));
        let err = invoke::<ScriptResult>(&client, "p").await.unwrap_err();
        assert!(matches!(err, AiError::Decode { provider: Provider::OpenAI, .. }));
    }

    #[test]
    fn test_create_client_dispatches_on_provider() {
        for provider in Provider::all() {
            let config = AiConfig::new(provider, "k");
            let client = create_client(&config);
            assert_eq!(client.provider(), provider);
            assert_eq!(client.model(), provider.default_model());
        }
    }
}
