//! Pulls a JSON object out of free-form model text.
//!
//! Candidates are tried in order: a fenced code block, the outermost
//! `{ ... }` span, then the raw text. The first one that parses wins.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```[ \t]*(?:json|JSON)?[ \t]*\r?\n([\s\S]*?)\r?\n[ \t]*```")
            .expect("fenced block pattern is valid")
    })
}

fn bare_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("bare object pattern is valid"))
}

/// Candidate JSON payloads in the order they should be tried
pub fn candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::with_capacity(3);
    if let Some(block) = fenced_block().captures(text).and_then(|c| c.get(1)) {
        out.push(block.as_str());
    }
    if let Some(object) = bare_object().find(text) {
        out.push(object.as_str());
    }
    out.push(text.trim());
    out
}

/// Parse the first candidate that is valid JSON. On total failure the error
/// from the last attempt is returned.
pub fn extract_json(text: &str) -> Result<Value, serde_json::Error> {
    let mut last_err = None;
    for candidate in candidates(text) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = Some(e),
        }
    }
    // candidates() always yields the raw text, so at least one attempt ran
    match last_err {
        Some(e) => Err(e),
        None => serde_json::from_str::<Value>(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_json_block() {
        let text = "```json\n{\"analysis_summary\":\"a\",\"final_script\":\"b\"}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value, json!({"analysis_summary": "a", "final_script": "b"}));
    }

    #[test]
    fn test_bare_object_between_noise() {
        let text = "noise {\"analysis_summary\":\"a\",\"final_script\":\"b\"} noise";
        let value = extract_json(text).unwrap();
        assert_eq!(value, json!({"analysis_summary": "a", "final_script": "b"}));
    }

    #[test]
    fn test_fence_without_label_and_crlf() {
        let text = "Here you go:\r\n```\r\n{\"k\": 1}\r\n```\r\nThanks";
        assert_eq!(extract_json(text).unwrap(), json!({"k": 1}));
    }

    #[test]
    fn test_nested_braces_inside_strings() {
        let text = "결과입니다: {\"final_script\": \"(자막: {강조})\", \"n\": {\"x\": 2}} 끝";
        let value = extract_json(text).unwrap();
        assert_eq!(value["final_script"], "(자막: {강조})");
        assert_eq!(value["n"]["x"], 2);
    }

    #[test]
    fn test_invalid_candidates_all_fail() {
        let text = "```json\n{\"a\": 1,}\n```\n{\"a\": 2}";
        // the fenced payload is invalid; the outermost span covers both
        // objects and is invalid too; raw text is invalid as well
        assert!(extract_json(text).is_err());

        let text = "```json\nnot json\n```";
        assert!(extract_json(text).is_err());
    }

    #[test]
    fn test_plain_json_passes_through() {
        assert_eq!(extract_json("  {\"a\": [1, 2]}  ").unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_candidate_order() {
        let text = "pre ```json\n{\"a\":1}\n``` post";
        let found = candidates(text);
        assert_eq!(found[0], "{\"a\":1}");
        assert_eq!(found.last().copied(), Some(text));
    }
}
