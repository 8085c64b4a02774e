//! Tool-call extraction from free-text model replies
//!
//! The chat model is asked to emit `{"tool": "<name>", "params": {...}}`
//! when it wants a tool, but the reply format is not contractually
//! fixed: the object arrives intermixed with prose, sometimes with
//! nested braces in the params. Extraction is layered — strict patterns
//! first, then a brace-depth scan — and never fails; when nothing
//! parses the reply is treated as plain text.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Strict shape: flat params object with no nested braces
static STRICT_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"tool"\s*:\s*"[^"]+"\s*,\s*"params"\s*:\s*\{[^{}]*\}\s*\}"#)
        .expect("static regex")
});

/// Looser shape: any single-level object mentioning "tool"
static LOOSE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{[^{}]*"tool"[^{}]*\}"#).expect("static regex"));

/// A structured command parsed out of one model reply
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Tool name, matched against the dispatcher's fixed set
    pub tool: String,

    /// Flat key/value parameters
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ToolCall {
    /// String parameter by key
    #[must_use]
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Integer parameter by key; numeric strings are accepted too
    #[must_use]
    pub fn int_param(&self, key: &str) -> Option<i64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Extract at most one embedded tool call from a model reply
///
/// Returns `None` when the reply carries no parseable call; the caller
/// then treats the reply as the final answer.
#[must_use]
pub fn extract_tool_call(reply: &str) -> Option<ToolCall> {
    for pattern in [&*STRICT_CALL, &*LOOSE_CALL] {
        if let Some(m) = pattern.find(reply)
            && let Ok(call) = serde_json::from_str::<ToolCall>(m.as_str())
        {
            return Some(call);
        }
    }

    // Fallback for nested params: balanced-brace scan from the first
    // `{"tool"` occurrence
    if reply.contains("\"tool\"") {
        let span = balanced_span(reply)?;
        if let Ok(call) = serde_json::from_str::<ToolCall>(span) {
            return Some(call);
        }
    }

    None
}

/// Find the balanced `{...}` span starting at the first `{"tool"`
fn balanced_span(reply: &str) -> Option<&str> {
    let start = reply.find("{\"tool\"").or_else(|| {
        // Tolerate whitespace between the brace and the key
        let key = reply.find("\"tool\"")?;
        reply[..key].rfind('{')
    })?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in reply[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&reply[start..=start + i]);
                }
            }
            _ => {}
        }
    }

    None
}
