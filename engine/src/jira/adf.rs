//! Atlassian Document Format helpers
//!
//! Jira REST v3 returns descriptions and comments as ADF trees and expects
//! the same shape back. The engine only ever deals in plain text.

use serde_json::{json, Value};

/// Leaf blocks always end their own line
const LINE_NODES: &[&str] = &["paragraph", "heading", "codeBlock"];

/// Container blocks end a line unless a child already did
const CONTAINER_NODES: &[&str] = &["listItem", "blockquote", "rule", "tableRow"];

/// Flatten an ADF value (or a plain string) into text
pub fn to_plain_text(value: &Value) -> String {
    let mut out = String::new();
    flatten_into(value, &mut out);
    out.trim().to_string()
}

fn flatten_into(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Object(map) => {
            let node_type = map.get("type").and_then(Value::as_str).unwrap_or("");
            if node_type == "hardBreak" {
                out.push('\n');
                return;
            }
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
            if let Some(content) = map.get("content") {
                flatten_into(content, out);
            }
            if LINE_NODES.contains(&node_type)
                || (CONTAINER_NODES.contains(&node_type) && !out.ends_with('\n'))
            {
                out.push('\n');
            }
        }
        _ => {}
    }
}

/// Wrap plain text into an ADF document, one paragraph per line
pub fn from_plain_text(text: &str) -> Value {
    let paragraphs: Vec<Value> = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                json!({ "type": "paragraph", "content": [] })
            } else {
                json!({
                    "type": "paragraph",
                    "content": [{ "type": "text", "text": line }]
                })
            }
        })
        .collect();

    json!({
        "type": "doc",
        "version": 1,
        "content": paragraphs
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested_document() {
        let doc = json!({
            "type": "doc",
            "version": 1,
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "GET /api/users"},
                    {"type": "hardBreak"},
                    {"type": "text", "text": "returns a list"}
                ]},
                {"type": "paragraph", "content": [{"type": "text", "text": "Second"}]}
            ]
        });

        assert_eq!(to_plain_text(&doc), "GET /api/users\nreturns a list\nSecond");
    }

    #[test]
    fn test_flatten_plain_string_and_null() {
        assert_eq!(to_plain_text(&json!("  legacy text ")), "legacy text");
        assert_eq!(to_plain_text(&Value::Null), "");
    }

    #[test]
    fn test_from_plain_text() {
        let doc = from_plain_text("line one\n\nline two");
        assert_eq!(doc["type"], "doc");
        assert_eq!(doc["content"].as_array().map(Vec::len), Some(3));
        assert_eq!(doc["content"][2]["content"][0]["text"], "line two");
        assert_eq!(to_plain_text(&doc), "line one\n\nline two");
    }
}
