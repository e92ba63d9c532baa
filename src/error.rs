use crate::provider::Provider;
use thiserror::Error;

/// Failures from a provider call. Diagnostic only: the workflow collapses
/// every variant into one user-facing message.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("{provider} API error: {status} {reason}")]
    Http {
        provider: Provider,
        status: u16,
        reason: String,
        body: String,
    },

    #[error("No response from {provider}")]
    EmptyResponse { provider: Provider },

    #[error("Could not decode {provider} response: {reason}")]
    Decode { provider: Provider, reason: String },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
}

impl AiError {
    pub fn provider(&self) -> Provider {
        match self {
            AiError::Http { provider, .. }
            | AiError::EmptyResponse { provider }
            | AiError::Decode { provider, .. }
            | AiError::Transport { provider, .. } => *provider,
        }
    }

    pub(crate) fn decode(provider: Provider, reason: impl Into<String>) -> Self {
        AiError::Decode {
            provider,
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(provider: Provider) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| AiError::Transport { provider, source }
    }
}

/// Input problems caught before any request is sent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("먼저 AI API 키를 설정해주세요.")]
    MissingApiKey,

    #[error("참고할 기존 대본을 입력해주세요.")]
    EmptyTranscript,

    #[error("새로운 주제를 입력해주세요.")]
    EmptyTopic,

    #[error("이미 요청을 처리하고 있습니다.")]
    Busy,

    #[error("지금 단계에서는 이 작업을 할 수 없습니다.")]
    WrongStep,
}
