//! Extract decisions from free-form backend text
//!
//! Models wrap their answer in all sorts of packaging: `<think>` preambles,
//! markdown fences, chatty explanations, trailing commas. Parsing never
//! fails loudly; anything unrecoverable is `None` and the worker falls back.

use crate::simulation::decision::Decision;
use serde_json::Value;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Parse the first JSON object found in `text`
pub fn parse_json(text: &str) -> Option<Value> {
    let cleaned = strip_fences(&strip_reasoning(text));
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&cleaned) {
        return Some(value);
    }

    let span = first_object_span(&cleaned)?;
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(span) {
        return Some(value);
    }

    match serde_json::from_str::<Value>(&repair_trailing_commas(span)) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Parse straight to a [`Decision`]
pub fn parse_decision(text: &str) -> Option<Decision> {
    parse_json(text).and_then(|value| Decision::from_json(&value))
}

/// Drop every `<think>...</think>` block. An unclosed `<think>` loses only
/// the tag.
fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        let after = start + THINK_OPEN.len();
        match rest[after..].find(THINK_CLOSE) {
            Some(end) => rest = &rest[after + end + THINK_CLOSE.len()..],
            None => rest = &rest[after..],
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn strip_fences(text: &str) -> String {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim().to_string()
}

/// First balanced `{...}` span, ignoring braces inside string literals.
/// An unbalanced tail falls back to the last closing brace.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Remove commas that directly precede `}` or `]`, outside strings
fn repair_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        }
        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::decision::ActionKind;

    #[test]
    fn test_plain_object() {
        let value = parse_json(r#"{"action": "REST", "thought": "tired"}"#).unwrap();
        assert_eq!(value["action"], "REST");
    }

    #[test]
    fn test_reasoning_preamble_and_fence() {
        let text = "<think>\nThe agent is thirsty, {maybe} the fountain.\n</think>\n```json\n{\"thought\": \"Water\", \"action\": \"GOTO\", \"target\": \"Fountain\"}\n```";
        let decision = parse_decision(text).unwrap();
        assert_eq!(decision.action, ActionKind::Goto);
        assert_eq!(decision.target.as_deref(), Some("Fountain"));
    }

    #[test]
    fn test_trailing_comma() {
        let text = r#"{"thought": "Hm", "action": "IDLE",}"#;
        let value = parse_json(text).unwrap();
        assert_eq!(value["action"], "IDLE");

        let nested = r#"Sure! {"action": "TRADE", "tags": ["a", "b",],} hope that helps"#;
        assert_eq!(parse_json(nested).unwrap()["action"], "TRADE");
    }

    #[test]
    fn test_object_inside_prose() {
        let text = r#"I think the best move is {"action": "MOVE", "direction": "north", "thought": "go {up}"} and then more."#;
        let value = parse_json(text).unwrap();
        assert_eq!(value["direction"], "north");
        assert_eq!(value["thought"], "go {up}");
    }

    #[test]
    fn test_commas_inside_strings_survive_repair() {
        let text = r#"{"speech": "Wait,}", "action": "TALK",}"#;
        let value = parse_json(text).unwrap();
        assert_eq!(value["speech"], "Wait,}");
    }

    #[test]
    fn test_unclosed_think_keeps_the_answer() {
        let value = parse_json("<think>never closed {\"action\": \"MOVE\", \"direction\": \"east\"}").unwrap();
        assert_eq!(value["action"], "MOVE");
        assert_eq!(strip_reasoning("a <think>b"), "a b");
        assert_eq!(strip_reasoning("<think>x</think>keep<think>tail"), "keeptail");
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_json("").is_none());
        assert!(parse_json("I would rather not answer.").is_none());
        assert!(parse_json("[1, 2, 3]").is_none());
        assert!(parse_json("{not json at all}").is_none());
    }
}
