pub mod ai;
pub mod config;
pub mod error;
pub mod history;
pub mod prompt;
pub mod provider;
pub mod state;
pub mod store;
pub mod workflow;

// Re-export main types for convenience
pub use ai::{create_client, invoke, AiClient, ClaudeClient, GeminiClient, OpenAIClient};
pub use config::{AiConfig, KeySource};
pub use error::{AiError, ValidationError};
pub use history::HistoryStore;
pub use provider::Provider;
pub use state::{ChannelType, HistoryItem, ScriptResult, TopicSuggestion, VideoConfig, VideoLength};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use workflow::{CallKind, PendingCall, Workflow, WorkflowMode, WorkflowStep};
