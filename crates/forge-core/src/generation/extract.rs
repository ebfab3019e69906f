//! JSON extraction from free-form model output.
//!
//! Two passes only: strip a surrounding code fence and parse; if that fails,
//! take the outermost `{...}` or `[...]` span and parse once more.

use serde_json::Value;

/// Remove a surrounding Markdown code fence, including a language tag.
///
/// Text that does not start with a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The opening fence line may carry a language tag (```json).
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost JSON-looking span: first `{` to last `}`, or, when the text
/// holds no object span, first `[` to last `]`.
///
/// Objects win so that bracketed prose around a single object is ignored.
pub fn outermost_span(text: &str) -> Option<&str> {
    span_between(text, '{', '}').or_else(|| span_between(text, '[', ']'))
}

fn span_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse model output as JSON, with a single salvage attempt.
///
/// The error returned is from the last parse attempted, so it describes the
/// salvaged span when one was found.
pub fn parse_model_json(text: &str) -> Result<Value, serde_json::Error> {
    let stripped = strip_code_fence(text);
    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(first) => match outermost_span(stripped) {
            Some(span) if span.len() < stripped.len() => serde_json::from_str(span),
            _ => Err(first),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_fence_with_language_tag() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence_and_whitespace() {
        let text = "  \n```\n[1, 2]\n```  \n";
        assert_eq!(strip_code_fence(text), "[1, 2]");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn parses_fenced_json() {
        let value = parse_model_json("```json\n{\"confidence\": \"high\"}\n```").unwrap();
        assert_eq!(value, json!({ "confidence": "high" }));
    }

    #[test]
    fn salvages_object_surrounded_by_prose() {
        let text = "Sure! Here is the plan:\n{\"title\": \"Yoga 101\", \"tags\": [\"a\"]}\nLet me know.";
        let value = parse_model_json(text).unwrap();
        assert_eq!(value, json!({ "title": "Yoga 101", "tags": ["a"] }));
    }

    #[test]
    fn salvages_array_surrounded_by_prose() {
        let value = parse_model_json("ids: [\"v1\", \"v2\"] (done)").unwrap();
        assert_eq!(value, json!(["v1", "v2"]));
    }

    #[test]
    fn salvage_ignores_brackets_in_prose() {
        let value = parse_model_json("Step [1] done. Result: {\"a\": 1}").unwrap();
        assert_eq!(value, json!({ "a": 1 }));

        let value = parse_model_json("Note [see below]: {\"a\": 1} thanks").unwrap();
        assert_eq!(value, json!({ "a": 1 }));

        let value = parse_model_json("result {\"ids\": [1, 2]} end").unwrap();
        assert_eq!(value, json!({ "ids": [1, 2] }));
    }

    #[test]
    fn fails_without_balanced_braces() {
        assert!(parse_model_json("no json here").is_err());
        assert!(parse_model_json("{ \"a\": 1").is_err());
        assert!(parse_model_json("] backwards [").is_err());
        assert!(outermost_span("} {").is_none());
    }

    #[test]
    fn failure_is_deterministic() {
        let text = "prefix {\"a\": } suffix";
        let first = parse_model_json(text).unwrap_err().to_string();
        let second = parse_model_json(text).unwrap_err().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn only_one_salvage_pass() {
        // The outermost span is itself invalid; no nested span is tried.
        let text = "{ broken {\"a\": 1} }";
        assert!(parse_model_json(text).is_err());
    }
}
