//! Prompt templates for the analyze and generate calls.
//!
//! Every builder is a pure function of its arguments. The transcript and
//! topic are substituted verbatim.

use crate::state::{ChannelType, VideoLength};

const ROLE_PREAMBLE: &str =
    "당신은 세계적인 유튜브 전략가이자 100만 유튜버의 메인 작가입니다.";

const COMPLIANCE_BLOCK: &str = "\
[콘텐츠 정책 준수]
- 유튜브 커뮤니티 가이드를 위반하는 내용(폭력 미화, 혐오 표현, 성적인 내용, 자해 조장, 불법 행위 안내, 검증되지 않은 의료 정보)은 절대 포함하지 마십시오.
- 일반인의 실명은 모두 가명으로 바꾸십시오 (예: 김OO 대신 '민수').
- 공인(정치인, 연예인, 기업인 등)과 역사적 인물의 이름은 그대로 유지하십시오.
- 특정 개인이나 단체를 비방하거나 허위 사실을 단정하지 마십시오.";

fn channel_framing(channel: ChannelType) -> &'static str {
    match channel {
        ChannelType::StoryChannel => {
            "이 채널은 '썰채널'입니다. 시청자가 친구에게 이야기를 듣는 것처럼 몰입할 수 있는 1인칭 또는 관찰자 시점의 스토리텔링이 핵심입니다."
        }
        ChannelType::Folktale => {
            "이 채널은 '야담' 채널입니다. 실화나 옛이야기를 바탕으로 한 충격적이거나 감동적인 전개, 그리고 여운이 남는 결말이 핵심입니다."
        }
        ChannelType::Health => {
            "이 채널은 '건강' 채널입니다. 시청자의 불안과 궁금증을 건드리는 도입, 이해하기 쉬운 설명, 실천 가능한 정보 전달이 핵심입니다."
        }
        ChannelType::RealEstate => {
            "이 채널은 '부동산' 채널입니다. 시장 흐름과 구체적인 숫자, 투자 판단에 도움이 되는 인사이트 전달이 핵심입니다."
        }
    }
}

fn length_pacing(length: VideoLength) -> &'static str {
    match length {
        VideoLength::Shorts => {
            "영상 길이는 쇼츠(60초 이내)입니다. 첫 1초 안에 훅을 던지고, 군더더기 없이 핵심 전개와 반전만 남겨 약 300자 내외로 작성하십시오."
        }
        VideoLength::UnderTen => {
            "영상 길이는 5-10분입니다. 도입-전개-절정-결말을 균형 있게 배치하고, 1-2분마다 궁금증을 유발하는 장치를 넣어 약 2,000-3,500자로 작성하십시오."
        }
        VideoLength::Thirty => {
            "영상 길이는 20-30분입니다. 여러 개의 작은 에피소드나 챕터로 나누어 심층적으로 전개하고, 챕터마다 작은 클라이맥스를 두어 약 8,000-12,000자로 작성하십시오."
        }
    }
}

fn push_video_context(
    prompt: &mut String,
    channel: Option<ChannelType>,
    length: Option<VideoLength>,
) {
    if channel.is_none() && length.is_none() {
        return;
    }
    prompt.push_str("[영상 구성]\n");
    if let Some(channel) = channel {
        prompt.push_str(&format!(
            "- 채널 유형: {} ({})\n",
            channel.label(),
            channel.description()
        ));
        prompt.push_str("- ");
        prompt.push_str(channel_framing(channel));
        prompt.push('\n');
    }
    if let Some(length) = length {
        prompt.push_str(&format!(
            "- 영상 길이: {} ({})\n",
            length.label(),
            length.description()
        ));
        prompt.push_str("- ");
        prompt.push_str(length_pacing(length));
        prompt.push('\n');
    }
    prompt.push('\n');
}

/// Step one of the two-call pipeline: analyze the transcript and suggest new
/// topics. Output keys: `analysis_summary`, `suggested_topics`.
pub fn build_analysis_prompt(transcript: &str, channel: Option<ChannelType>) -> String {
    let mut prompt = String::new();

    prompt.push_str(ROLE_PREAMBLE);
    prompt.push_str("\n\n");

    push_video_context(&mut prompt, channel, None);

    prompt.push_str("[Task]\n");
    prompt.push_str("1. 제공된 \"원본 대본\"을 심층 분석하십시오. 이 영상이 왜 성공했는지, 훅(Hook)은 어떠한지, 리텐션 유지 장치는 무엇인지 파악하십시오.\n");
    prompt.push_str("2. 대본의 구조(도입-전개-절정-결말)와 감정선을 추출하십시오.\n");
    prompt.push_str("3. 이 구조를 그대로 재활용하여 떡상할 수 있는 \"새로운 주제\" 3~5개를 제안하십시오. 주제는 원본과 다른 소재여야 하지만, 동일한 감정선이나 논리 구조를 가질 수 있어야 합니다.\n");
    if channel.is_some() {
        prompt.push_str("4. 제안하는 주제는 모두 위 채널 유형의 시청자에게 맞아야 합니다.\n");
    }
    prompt.push('\n');

    prompt.push_str("[Input Data]\n");
    prompt.push_str("원본 대본:\n");
    prompt.push_str(transcript);
    prompt.push_str("\n\n");

    prompt.push_str(COMPLIANCE_BLOCK);
    prompt.push_str("\n\n");

    prompt.push_str("[Requirements]\n");
    prompt.push_str("- 반드시 한국어로 답변하십시오.\n");
    prompt.push_str("- 분석 요약은 2-3문장으로 간결하게 작성하십시오.\n");
    prompt.push_str("- 각 주제는 영상 제목처럼 한 문장으로 작성하십시오.\n\n");

    prompt.push_str("[Output Format - JSON]\n");
    prompt.push_str("다른 설명 없이 아래 두 개의 키를 가진 JSON 객체 하나만 출력하십시오.\n");
    prompt.push_str("{\n");
    prompt.push_str("  \"analysis_summary\": \"원본 영상의 성공 요인 분석 (2-3문장)\",\n");
    prompt.push_str("  \"suggested_topics\": [\"새로운 주제 1\", \"새로운 주제 2\", \"새로운 주제 3\"]\n");
    prompt.push_str("}\n");

    prompt
}

/// Step two of the two-call pipeline: write a full script for `topic` in the
/// style of the transcript. Output keys: `analysis_summary`, `final_script`.
pub fn build_script_prompt(
    transcript: &str,
    topic: &str,
    channel: Option<ChannelType>,
    length: Option<VideoLength>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(ROLE_PREAMBLE);
    prompt.push_str("\n\n");

    push_video_context(&mut prompt, channel, length);

    prompt.push_str("[Task]\n");
    prompt.push_str("1. 제공된 \"원본 대본\"의 구조, 훅, 리텐션 장치, 문체를 분석하십시오.\n");
    prompt.push_str("2. 분석한 구조와 스타일을 그대로 활용하여 \"새로운 주제\"에 대한 완전한 대본을 작성하십시오.\n\n");

    push_script_inputs(&mut prompt, transcript, topic);

    prompt.push_str(COMPLIANCE_BLOCK);
    prompt.push_str("\n\n");

    push_script_requirements(&mut prompt);
    push_script_output_format(&mut prompt);

    prompt
}

/// Single-call mode: analysis and script in one request.
/// Output keys: `analysis_summary`, `final_script`.
pub fn build_combined_prompt(
    transcript: &str,
    topic: &str,
    channel: Option<ChannelType>,
    length: Option<VideoLength>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(ROLE_PREAMBLE);
    prompt.push_str("\n\n");

    push_video_context(&mut prompt, channel, length);

    prompt.push_str("[Task]\n");
    prompt.push_str("1. 제공된 \"원본 대본\"을 심층 분석하십시오. 이 영상이 왜 성공했는지, 훅(Hook)은 어떠한지, 리텐션 유지 장치는 무엇인지 파악하십시오.\n");
    prompt.push_str("2. 분석한 구조와 스타일을 활용하여 \"새로운 주제\"에 대한 완전한 대본을 작성하십시오.\n\n");

    push_script_inputs(&mut prompt, transcript, topic);

    prompt.push_str(COMPLIANCE_BLOCK);
    prompt.push_str("\n\n");

    push_script_requirements(&mut prompt);
    push_script_output_format(&mut prompt);

    prompt
}

fn push_script_inputs(prompt: &mut String, transcript: &str, topic: &str) {
    prompt.push_str("[Input Data]\n");
    prompt.push_str("1. 원본 대본 (분석 및 스타일 참고용):\n");
    prompt.push_str(transcript);
    prompt.push_str("\n\n");
    prompt.push_str("2. 새로운 주제:\n");
    prompt.push_str(topic);
    prompt.push_str("\n\n");
}

fn push_script_requirements(prompt: &mut String) {
    prompt.push_str("[Requirements]\n");
    prompt.push_str("- 원본 대본의 구조(도입-전개-절정-결말)를 정확히 분석하고 재현하십시오.\n");
    prompt.push_str("- 훅(Hook)은 매우 강력해야 합니다 (첫 3초가 핵심).\n");
    prompt.push_str("- 문체는 구어체로 자연스럽게 작성하십시오.\n");
    prompt.push_str("- 괄호 ( ) 안에 시각 자료나 편집 지시사항을 포함하십시오.\n");
    prompt.push_str("- 리텐션을 유지하는 장치(질문, 반전, 긴장감 등)를 포함하십시오.\n");
    prompt.push_str("- 언어: 한국어\n");
    prompt.push_str("- 분석 요약은 2-3문장으로 간결하게 작성하십시오.\n\n");
}

fn push_script_output_format(prompt: &mut String) {
    prompt.push_str("[Output Format - JSON]\n");
    prompt.push_str("다른 설명 없이 아래 두 개의 키를 가진 JSON 객체 하나만 출력하십시오.\n");
    prompt.push_str("{\n");
    prompt.push_str("  \"analysis_summary\": \"원본 영상의 성공 요인 분석 (2-3문장)\",\n");
    prompt.push_str("  \"final_script\": \"새로운 주제로 작성된 완전한 대본\"\n");
    prompt.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_prompt_is_deterministic() {
        for channel in ChannelType::all() {
            for length in VideoLength::all() {
                let a = build_script_prompt("옛날에...", "t2", Some(channel), Some(length));
                let b = build_script_prompt("옛날에...", "t2", Some(channel), Some(length));
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_transcript_and_topic_are_embedded_verbatim() {
        let transcript = "line one\n\"quoted\" {braces} ```fence```";
        let prompt = build_script_prompt(transcript, "새 주제 <b>", None, None);
        assert!(prompt.contains(transcript));
        assert!(prompt.contains("새 주제 <b>"));
    }

    #[test]
    fn test_channel_and_length_framing_only_when_supplied() {
        let bare = build_script_prompt("t", "topic", None, None);
        assert!(!bare.contains("[영상 구성]"));

        let framed = build_script_prompt(
            "t",
            "topic",
            Some(ChannelType::Health),
            Some(VideoLength::Shorts),
        );
        assert!(framed.contains("[영상 구성]"));
        assert!(framed.contains(channel_framing(ChannelType::Health)));
        assert!(framed.contains(length_pacing(VideoLength::Shorts)));
        assert!(!framed.contains(channel_framing(ChannelType::RealEstate)));
    }

    #[test]
    fn test_every_prompt_carries_compliance_and_output_keys() {
        let analysis = build_analysis_prompt("t", Some(ChannelType::Folktale));
        assert!(analysis.contains(COMPLIANCE_BLOCK));
        assert!(analysis.contains("\"analysis_summary\""));
        assert!(analysis.contains("\"suggested_topics\""));
        assert!(!analysis.contains("\"final_script\""));

        let script = build_script_prompt("t", "topic", None, None);
        assert!(script.contains(COMPLIANCE_BLOCK));
        assert!(script.contains("\"analysis_summary\""));
        assert!(script.contains("\"final_script\""));

        let combined = build_combined_prompt("t", "topic", None, None);
        assert!(combined.contains(COMPLIANCE_BLOCK));
        assert!(combined.contains("\"final_script\""));
    }

    #[test]
    fn test_analysis_prompt_ignores_length() {
        let prompt = build_analysis_prompt("t", None);
        assert!(!prompt.contains("영상 길이"));
    }
}
