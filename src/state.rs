//! UI-agnostic data types
//!
//! Result shapes returned by the providers, persisted history entries and the
//! per-session video configuration. Shared by the TUI and the headless CLI.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Maximum number of suggested topics kept from an analysis response
pub const MAX_TOPICS: usize = 5;

/// Result of the analyze step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSuggestion {
    pub analysis_summary: String,
    pub suggested_topics: Vec<String>,
}

impl TopicSuggestion {
    /// Trim topics, drop blank ones and cap the list at [`MAX_TOPICS`].
    pub fn normalized(mut self) -> Self {
        self.suggested_topics = self
            .suggested_topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_TOPICS)
            .collect();
        self
    }
}

/// Result of the generate step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptResult {
    pub analysis_summary: String,
    pub final_script: String,
}

/// A past generation, newest first in the history list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub date: String,
    pub topic: String,
    pub script: String,
    pub analysis: String,
}

impl HistoryItem {
    pub const DATE_FORMAT: &'static str = "%Y. %m. %d. %H:%M:%S";

    pub fn new(topic: impl Into<String>, result: &ScriptResult, created: DateTime<Local>) -> Self {
        Self {
            id: created.timestamp_millis().to_string(),
            date: created.format(Self::DATE_FORMAT).to_string(),
            topic: topic.into(),
            script: result.final_script.clone(),
            analysis: result.analysis_summary.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    #[serde(rename = "썰채널")]
    StoryChannel,
    #[serde(rename = "야담")]
    Folktale,
    #[serde(rename = "건강")]
    Health,
    #[serde(rename = "부동산")]
    RealEstate,
}

impl ChannelType {
    pub fn all() -> [ChannelType; 4] {
        [
            ChannelType::StoryChannel,
            ChannelType::Folktale,
            ChannelType::Health,
            ChannelType::RealEstate,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChannelType::StoryChannel => "썰채널",
            ChannelType::Folktale => "야담",
            ChannelType::Health => "건강",
            ChannelType::RealEstate => "부동산",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChannelType::StoryChannel => "스토리텔링 중심의 흥미로운 이야기",
            ChannelType::Folktale => "실화 기반의 충격적이거나 감동적인 이야기",
            ChannelType::Health => "건강 정보와 의학 지식 전달",
            ChannelType::RealEstate => "부동산 투자와 시장 분석",
        }
    }

    /// Accepts the Korean label or the English variant name
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::all().into_iter().find(|c| {
            c.label() == s || format!("{:?}", c).eq_ignore_ascii_case(s)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoLength {
    #[serde(rename = "쇼츠")]
    Shorts,
    #[default]
    #[serde(rename = "10분 이내")]
    UnderTen,
    #[serde(rename = "30분")]
    Thirty,
}

impl VideoLength {
    pub fn all() -> [VideoLength; 3] {
        [VideoLength::Shorts, VideoLength::UnderTen, VideoLength::Thirty]
    }

    pub fn label(&self) -> &'static str {
        match self {
            VideoLength::Shorts => "쇼츠",
            VideoLength::UnderTen => "10분 이내",
            VideoLength::Thirty => "30분",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            VideoLength::Shorts => "60초 이내 (핵심만 빠르게)",
            VideoLength::UnderTen => "5-10분 (적당한 분량)",
            VideoLength::Thirty => "20-30분 (심층 분석)",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::all().into_iter().find(|l| {
            l.label() == s || format!("{:?}", l).eq_ignore_ascii_case(s)
        })
    }
}

/// Channel and length chosen for the current session. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    pub channel_type: ChannelType,
    pub video_length: VideoLength,
}

impl VideoConfig {
    /// Label stored with a history entry, e.g. `[건강/쇼츠] topic`
    pub fn history_label(&self, topic: &str) -> String {
        format!(
            "[{}/{}] {}",
            self.channel_type.label(),
            self.video_length.label(),
            topic
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalized_drops_blank_and_caps_topics() {
        let suggestion = TopicSuggestion {
            analysis_summary: "a".to_string(),
            suggested_topics: vec![
                "  one ".to_string(),
                "".to_string(),
                "two".to_string(),
                "   ".to_string(),
                "three".to_string(),
                "four".to_string(),
                "five".to_string(),
                "six".to_string(),
            ],
        }
        .normalized();

        assert_eq!(
            suggestion.suggested_topics,
            vec!["one", "two", "three", "four", "five"]
        );
    }

    #[test]
    fn test_history_item_copies_result_verbatim() {
        let result = ScriptResult {
            analysis_summary: "요약".to_string(),
            final_script: "대본\n둘째 줄".to_string(),
        };
        let created = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let item = HistoryItem::new("[건강/쇼츠] t2", &result, created);

        assert_eq!(item.id, created.timestamp_millis().to_string());
        assert_eq!(item.date, "2024. 03. 05. 14:07:09");
        assert_eq!(item.script, result.final_script);
        assert_eq!(item.analysis, result.analysis_summary);
    }

    #[test]
    fn test_history_label_composes_channel_length_topic() {
        let config = VideoConfig {
            channel_type: ChannelType::Health,
            video_length: VideoLength::Shorts,
        };
        assert_eq!(config.history_label("t2"), "[건강/쇼츠] t2");
    }

    #[test]
    fn test_parse_accepts_label_and_variant_name() {
        assert_eq!(ChannelType::parse("건강"), Some(ChannelType::Health));
        assert_eq!(ChannelType::parse("realestate"), Some(ChannelType::RealEstate));
        assert_eq!(VideoLength::parse("10분 이내"), Some(VideoLength::UnderTen));
        assert_eq!(VideoLength::parse("shorts"), Some(VideoLength::Shorts));
        assert_eq!(VideoLength::parse("1시간"), None);
    }
}
