use anyhow::Result;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::sync::Arc;
use viral_script::{
    AiConfig, ChannelType, HistoryItem, HistoryStore, KeySource, KeyValueStore, Provider,
    VideoConfig, VideoLength, Workflow, WorkflowStep,
};

/// Focusable panes on the input screen, in Tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Transcript,
    Channel,
    Length,
    History,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Transcript => FocusPane::Channel,
            FocusPane::Channel => FocusPane::Length,
            FocusPane::Length => FocusPane::History,
            FocusPane::History => FocusPane::Transcript,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicFocus {
    #[default]
    Suggestions,
    Custom,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub workflow: Workflow,
    pub history: HistoryStore,
    pub config: AiConfig,
    store: Arc<dyn KeyValueStore>,

    // Input screen
    pub focus: FocusPane,
    pub transcript_cursor: usize, // char index into workflow.transcript
    pub transcript_scroll: u16,
    pub history_state: ListState,

    // Topic selection
    pub topic_state: ListState,
    pub topic_focus: TopicFocus,
    pub custom_topic: String,
    pub custom_topic_cursor: usize,

    // Result view
    pub result_scroll: u16,
    pub result_height: u16,
    pub result_width: u16,
    pub script_area: Option<Rect>,

    // Transient notice shown in the status line (copy done, save failed)
    pub notice: Option<String>,

    // Animation state
    pub animation_frame: usize,

    // Provider picker
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,

    // API key input
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub api_key_target_provider: Option<Provider>,
}

impl App {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let config = match AiConfig::load_with_env(store.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                log::error!("falling back to default AI config: {:#}", e);
                AiConfig::default().with_env()
            }
        };
        let history = HistoryStore::load(store.clone())?;

        let mut history_state = ListState::default();
        if !history.is_empty() {
            history_state.select(Some(0));
        }

        Ok(Self {
            should_quit: false,
            workflow: Workflow::default(),
            history,
            config,
            store,

            focus: FocusPane::Transcript,
            transcript_cursor: 0,
            transcript_scroll: 0,
            history_state,

            topic_state: ListState::default(),
            topic_focus: TopicFocus::default(),
            custom_topic: String::new(),
            custom_topic_cursor: 0,

            result_scroll: 0,
            result_height: 0,
            result_width: 0,
            script_area: None,

            notice: None,

            animation_frame: 0,

            show_provider_picker: false,
            provider_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            api_key_target_provider: None,
        })
    }

    pub fn step(&self) -> WorkflowStep {
        self.workflow.step()
    }

    pub fn video(&self) -> VideoConfig {
        self.workflow.video.unwrap_or_default()
    }

    /// Error from the workflow, else the last notice
    pub fn status_message(&self) -> Option<&str> {
        self.workflow.error().or(self.notice.as_deref())
    }

    pub fn tick_animation(&mut self) {
        if self.workflow.is_busy() {
            self.animation_frame = self.animation_frame.wrapping_add(1);
        }
    }

    // Video configuration
    pub fn cycle_channel(&mut self, forward: bool) {
        let mut video = self.video();
        video.channel_type = cycle(&ChannelType::all(), video.channel_type, forward);
        self.workflow.video = Some(video);
    }

    pub fn cycle_length(&mut self, forward: bool) {
        let mut video = self.video();
        video.video_length = cycle(&VideoLength::all(), video.video_length, forward);
        self.workflow.video = Some(video);
    }

    // History list
    pub fn history_nav_down(&mut self) {
        let len = self.history.len();
        if len > 0 {
            let i = self.history_state.selected().unwrap_or(0);
            self.history_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn history_nav_up(&mut self) {
        let i = self.history_state.selected().unwrap_or(0);
        self.history_state.select(Some(i.saturating_sub(1)));
    }

    pub fn selected_history(&self) -> Option<&HistoryItem> {
        self.history_state
            .selected()
            .and_then(|i| self.history.items().get(i))
    }

    pub fn open_selected_history(&mut self) {
        if let Some(item) = self.selected_history().cloned() {
            self.workflow.select_history(&item);
            self.result_scroll = 0;
            self.notice = None;
        }
    }

    pub fn delete_selected_history(&mut self) -> Result<()> {
        let Some(i) = self.history_state.selected() else {
            return Ok(());
        };
        let Some(id) = self.history.items().get(i).map(|item| item.id.clone()) else {
            return Ok(());
        };
        self.history.remove(&id)?;

        // Adjust selection
        if self.history.is_empty() {
            self.history_state.select(None);
        } else if i >= self.history.len() {
            self.history_state.select(Some(self.history.len() - 1));
        }
        Ok(())
    }

    // Topic selection
    pub fn topic_nav_down(&mut self) {
        let len = self.workflow.suggested_topics().len();
        if len > 0 {
            let i = self.topic_state.selected().unwrap_or(0);
            self.topic_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn topic_nav_up(&mut self) {
        let i = self.topic_state.selected().unwrap_or(0);
        self.topic_state.select(Some(i.saturating_sub(1)));
    }

    pub fn selected_topic(&self) -> Option<String> {
        self.topic_state
            .selected()
            .and_then(|i| self.workflow.suggested_topics().get(i))
            .cloned()
    }

    /// Prepare the topic screen after an analysis lands
    pub fn enter_topic_selection(&mut self) {
        let has_topics = !self.workflow.suggested_topics().is_empty();
        self.topic_state.select(has_topics.then_some(0));
        self.topic_focus = TopicFocus::Suggestions;
        self.custom_topic.clear();
        self.custom_topic_cursor = 0;
    }

    /// Prepare the result screen after a generation lands
    pub fn enter_result(&mut self) {
        self.result_scroll = 0;
        if !self.history.is_empty() {
            self.history_state.select(Some(0));
        }
    }

    pub fn reset(&mut self) {
        self.workflow.reset();
        self.transcript_cursor = 0;
        self.transcript_scroll = 0;
        self.custom_topic.clear();
        self.custom_topic_cursor = 0;
        self.topic_state.select(None);
        self.result_scroll = 0;
        self.focus = FocusPane::Transcript;
        self.notice = None;
    }

    // Result scrolling
    fn max_result_scroll(&self) -> u16 {
        let width = if self.result_width > 0 {
            self.result_width as usize
        } else {
            60
        };
        let script = self.workflow.final_script().unwrap_or_default();
        let total = wrapped_line_count(script, width);
        total.saturating_sub(self.result_height)
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.result_scroll = self
            .result_scroll
            .saturating_add(lines)
            .min(self.max_result_scroll());
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.result_scroll = self.result_scroll.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.result_scroll = self.max_result_scroll();
    }

    // Provider picker
    pub fn open_provider_picker(&mut self) {
        let current_idx = Provider::all()
            .iter()
            .position(|p| *p == self.config.provider)
            .unwrap_or(0);
        self.provider_picker_state.select(Some(current_idx));
        self.show_provider_picker = true;
    }

    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Where a key for `provider` would come from if it were selected now
    pub fn key_source(&self, provider: Provider) -> Option<KeySource> {
        if provider == self.config.provider {
            return self.config.key_source();
        }
        let from_env = std::env::var(provider.env_var())
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        from_env.then_some(KeySource::Env)
    }

    /// Apply the picker selection. Opens the key popup when the provider has
    /// no usable key yet.
    pub fn choose_provider(&mut self) -> Result<()> {
        let Some(provider) = self
            .provider_picker_state
            .selected()
            .and_then(|i| Provider::all().get(i).copied())
        else {
            return Ok(());
        };
        self.show_provider_picker = false;

        if self.key_source(provider).is_none() {
            self.open_api_key_input(provider);
            return Ok(());
        }
        if provider != self.config.provider {
            self.config.set_provider(provider, None);
            self.config.save(self.store.as_ref())?;
            log::info!("switched provider to {}", provider);
        }
        Ok(())
    }

    pub fn open_api_key_input(&mut self, provider: Provider) {
        self.api_key_target_provider = Some(provider);
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
        self.show_api_key_input = true;
    }

    pub fn close_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
        self.api_key_target_provider = None;
    }

    /// Store the typed key for the target provider and make it current.
    pub fn save_api_key(&mut self) -> Result<()> {
        let key = self.api_key_input.trim().to_string();
        let target = self.api_key_target_provider;
        self.close_api_key_input();

        let (Some(provider), false) = (target, key.is_empty()) else {
            return Ok(());
        };
        self.config.set_provider(provider, Some(&key));
        self.config.save(self.store.as_ref())?;
        if self.workflow.error().is_some() {
            self.workflow.clear_error();
        }
        log::info!("stored API key for {}", provider);
        Ok(())
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let len = all.len();
    let i = all.iter().position(|v| *v == current).unwrap_or(0);
    let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
    all[next]
}

/// Rough count of rendered lines once `text` is wrapped at `width` columns
pub fn wrapped_line_count(text: &str, width: usize) -> u16 {
    let width = width.max(1);
    let lines: usize = text
        .lines()
        .map(|line| line.chars().count() / width + 1)
        .sum();
    lines.min(u16::MAX as usize) as u16
}
