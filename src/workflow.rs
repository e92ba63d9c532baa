//! Step-by-step flow from a pasted transcript to a finished script.
//!
//! ```text
//! Input --submit--> Analyzing --ok--> TopicSelection --pick--> Generating --ok--> Result
//!   ^                   |err               ^                       |err
//!   +-------------------+                  +-----------------------+
//! ```
//!
//! Each network call is split into a `begin_*` half, which validates input,
//! moves into the loading step and hands back the rendered prompt, and a
//! `finish_*` half that applies the provider's outcome. A UI can run the call
//! on a background task in between; [`Workflow::analyze`] and
//! [`Workflow::generate`] do both halves inline.

use crate::ai::{self, AiClient};
use crate::config::AiConfig;
use crate::error::{AiError, ValidationError};
use crate::history::HistoryStore;
use crate::prompt;
use crate::state::{HistoryItem, ScriptResult, TopicSuggestion, VideoConfig};
use chrono::Local;

pub const ANALYSIS_FAILED: &str =
    "대본 분석에 실패했습니다. API 키와 네트워크 연결을 확인해주세요.";
pub const GENERATION_FAILED: &str =
    "대본 생성에 실패했습니다. API 키와 네트워크 연결을 확인해주세요.";
pub const HISTORY_SAVE_FAILED: &str = "대본은 생성되었지만 기록 저장에 실패했습니다.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Input,
    Analyzing,
    TopicSelection,
    Generating,
    Result,
}

impl WorkflowStep {
    pub fn is_loading(&self) -> bool {
        matches!(self, WorkflowStep::Analyzing | WorkflowStep::Generating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowMode {
    /// Analyze, let the user pick a topic, then generate
    #[default]
    TwoStep,
    /// One combined call; the topic is entered up front
    SingleCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Analyze,
    Generate,
}

/// A request the caller must send and report back through `finish_*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub kind: CallKind,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    mode: WorkflowMode,
    step: WorkflowStep,
    pub transcript: String,
    /// `None` drops channel and length framing from the prompts
    pub video: Option<VideoConfig>,
    suggestion: Option<TopicSuggestion>,
    topic: String,
    result: Option<ScriptResult>,
    error: Option<String>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new(WorkflowMode::default())
    }
}

impl Workflow {
    pub fn new(mode: WorkflowMode) -> Self {
        Self {
            mode,
            step: WorkflowStep::Input,
            transcript: String::new(),
            video: Some(VideoConfig::default()),
            suggestion: None,
            topic: String::new(),
            result: None,
            error: None,
        }
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn is_busy(&self) -> bool {
        self.step.is_loading()
    }

    /// Which call is in flight, derived from the step
    pub fn pending_kind(&self) -> Option<CallKind> {
        match self.step {
            WorkflowStep::Analyzing => Some(CallKind::Analyze),
            WorkflowStep::Generating => Some(CallKind::Generate),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn suggested_topics(&self) -> &[String] {
        self.suggestion
            .as_ref()
            .map(|s| s.suggested_topics.as_slice())
            .unwrap_or(&[])
    }

    /// The topic being generated, or the one the result was written for
    pub fn selected_topic(&self) -> &str {
        &self.topic
    }

    /// Summary from the result once there is one, else from the analysis
    pub fn analysis_summary(&self) -> Option<&str> {
        self.result
            .as_ref()
            .map(|r| r.analysis_summary.as_str())
            .or_else(|| self.suggestion.as_ref().map(|s| s.analysis_summary.as_str()))
    }

    pub fn final_script(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.final_script.as_str())
    }

    fn reject(&mut self, err: ValidationError) -> ValidationError {
        self.error = Some(err.to_string());
        err
    }

    /// Start from INPUT: analysis in two-step mode, generation for the
    /// pre-entered topic in single-call mode.
    pub fn submit(&mut self, config: &AiConfig) -> Result<PendingCall, ValidationError> {
        match self.mode {
            WorkflowMode::TwoStep => self.begin_analysis(config),
            WorkflowMode::SingleCall => {
                let topic = self.topic.clone();
                self.begin_generation(&topic, config)
            }
        }
    }

    /// Topic typed on the input screen in single-call mode
    pub fn set_topic(&mut self, topic: &str) {
        if !self.is_busy() {
            self.topic = topic.to_string();
        }
    }

    pub fn begin_analysis(&mut self, config: &AiConfig) -> Result<PendingCall, ValidationError> {
        if self.is_busy() {
            return Err(self.reject(ValidationError::Busy));
        }
        if self.mode != WorkflowMode::TwoStep || self.step != WorkflowStep::Input {
            return Err(self.reject(ValidationError::WrongStep));
        }
        if !config.has_api_key() {
            return Err(self.reject(ValidationError::MissingApiKey));
        }
        if self.transcript.trim().is_empty() {
            return Err(self.reject(ValidationError::EmptyTranscript));
        }

        let channel = self.video.map(|v| v.channel_type);
        let prompt = prompt::build_analysis_prompt(&self.transcript, channel);

        self.step = WorkflowStep::Analyzing;
        self.error = None;
        Ok(PendingCall {
            kind: CallKind::Analyze,
            prompt,
        })
    }

    /// Apply an analysis outcome. Returns `false` if no analysis was pending
    /// (the outcome is stale and dropped).
    pub fn finish_analysis(&mut self, outcome: Result<TopicSuggestion, AiError>) -> bool {
        if self.step != WorkflowStep::Analyzing {
            log::debug!("dropping analysis outcome received in step {:?}", self.step);
            return false;
        }

        match outcome.map(TopicSuggestion::normalized) {
            Ok(suggestion) if suggestion.suggested_topics.is_empty() => {
                log::error!("analysis failed: response contained no suggested topics");
                self.error = Some(ANALYSIS_FAILED.to_string());
                self.step = WorkflowStep::Input;
            }
            Ok(suggestion) => {
                log::info!(
                    "analysis succeeded with {} topics",
                    suggestion.suggested_topics.len()
                );
                self.suggestion = Some(suggestion);
                self.topic.clear();
                self.step = WorkflowStep::TopicSelection;
            }
            Err(e) => {
                log::error!("analysis failed: {} ({:?})", e, e);
                self.error = Some(ANALYSIS_FAILED.to_string());
                self.step = WorkflowStep::Input;
            }
        }
        true
    }

    /// Start generating for `topic`, which may be a suggested topic or free text.
    pub fn begin_generation(
        &mut self,
        topic: &str,
        config: &AiConfig,
    ) -> Result<PendingCall, ValidationError> {
        if self.is_busy() {
            return Err(self.reject(ValidationError::Busy));
        }
        let expected = match self.mode {
            WorkflowMode::TwoStep => WorkflowStep::TopicSelection,
            WorkflowMode::SingleCall => WorkflowStep::Input,
        };
        if self.step != expected {
            return Err(self.reject(ValidationError::WrongStep));
        }
        if !config.has_api_key() {
            return Err(self.reject(ValidationError::MissingApiKey));
        }
        if self.transcript.trim().is_empty() {
            return Err(self.reject(ValidationError::EmptyTranscript));
        }
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(self.reject(ValidationError::EmptyTopic));
        }

        let channel = self.video.map(|v| v.channel_type);
        let length = self.video.map(|v| v.video_length);
        let prompt = match self.mode {
            WorkflowMode::TwoStep => {
                prompt::build_script_prompt(&self.transcript, topic, channel, length)
            }
            WorkflowMode::SingleCall => {
                prompt::build_combined_prompt(&self.transcript, topic, channel, length)
            }
        };

        self.topic = topic.to_string();
        self.step = WorkflowStep::Generating;
        self.error = None;
        Ok(PendingCall {
            kind: CallKind::Generate,
            prompt,
        })
    }

    /// Apply a generation outcome. On success exactly one history entry is
    /// prepended. Returns `false` for a stale outcome.
    pub fn finish_generation(
        &mut self,
        outcome: Result<ScriptResult, AiError>,
        history: &mut HistoryStore,
    ) -> bool {
        if self.step != WorkflowStep::Generating {
            log::debug!("dropping generation outcome received in step {:?}", self.step);
            return false;
        }

        match outcome {
            Ok(result) => {
                let label = match self.video {
                    Some(video) => video.history_label(&self.topic),
                    None => self.topic.clone(),
                };
                let item = HistoryItem::new(label, &result, Local::now());
                if let Err(e) = history.append(item) {
                    log::error!("could not persist history: {:#}", e);
                    self.error = Some(HISTORY_SAVE_FAILED.to_string());
                }
                log::info!(
                    "generation succeeded, {} char script",
                    result.final_script.chars().count()
                );
                self.result = Some(result);
                self.step = WorkflowStep::Result;
            }
            Err(e) => {
                log::error!("generation failed: {} ({:?})", e, e);
                self.error = Some(GENERATION_FAILED.to_string());
                self.step = match self.mode {
                    WorkflowMode::TwoStep => WorkflowStep::TopicSelection,
                    WorkflowMode::SingleCall => WorkflowStep::Input,
                };
            }
        }
        true
    }

    /// Show a stored result without calling any provider.
    pub fn select_history(&mut self, item: &HistoryItem) {
        self.result = Some(ScriptResult {
            analysis_summary: item.analysis.clone(),
            final_script: item.script.clone(),
        });
        self.topic = item.topic.clone();
        self.error = None;
        self.step = WorkflowStep::Result;
    }

    /// Back to an empty INPUT step. The video configuration is kept.
    pub fn reset(&mut self) {
        self.step = WorkflowStep::Input;
        self.transcript.clear();
        self.topic.clear();
        self.suggestion = None;
        self.result = None;
        self.error = None;
    }

    /// Leave topic selection to edit the transcript or configuration.
    pub fn back_to_input(&mut self) {
        if self.step == WorkflowStep::TopicSelection {
            self.step = WorkflowStep::Input;
            self.error = None;
        }
    }

    /// Run the analysis call inline.
    pub async fn analyze(
        &mut self,
        client: &dyn AiClient,
        config: &AiConfig,
    ) -> Result<(), ValidationError> {
        let call = self.begin_analysis(config)?;
        let outcome = ai::invoke::<TopicSuggestion>(client, &call.prompt).await;
        self.finish_analysis(outcome);
        Ok(())
    }

    /// Run the generation call inline for `topic`.
    pub async fn generate(
        &mut self,
        topic: &str,
        client: &dyn AiClient,
        config: &AiConfig,
        history: &mut HistoryStore,
    ) -> Result<(), ValidationError> {
        let call = self.begin_generation(topic, config)?;
        let outcome = ai::invoke::<ScriptResult>(client, &call.prompt).await;
        self.finish_generation(outcome, history);
        Ok(())
    }
}
