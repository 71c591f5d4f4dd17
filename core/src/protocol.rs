//! Directive protocol
//!
//! The model is asked to reply with exactly one JSON object per turn:
//! `{"tool": "<name>", "args": {...}}` or `{"final": "<message>"}`.
//! Real model output is unreliable, so [`extract_last_object`] recovers
//! the last well-formed top-level JSON object embedded anywhere in the
//! text, and [`Directive::from_value`] narrows it to one of the two
//! accepted shapes.

use serde_json::{Map, Value};

/// The single structured instruction expected from the model each turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Invoke a tool with string-keyed arguments
    ToolCall {
        name: String,
        args: Map<String, Value>,
    },
    /// Finish with a conversational answer
    FinalAnswer(String),
}

impl Directive {
    /// Convenience constructor for a tool call with one argument.
    pub fn tool_call(name: &str, key: &str, value: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert(key.to_string(), Value::String(value.into()));
        Directive::ToolCall {
            name: name.to_string(),
            args,
        }
    }

    /// Narrow a parsed JSON value to a directive.
    ///
    /// An object with a string `tool` key becomes a [`Directive::ToolCall`]
    /// (missing or non-object `args` degrade to an empty map); an object
    /// with a `final` key becomes a [`Directive::FinalAnswer`]. Anything
    /// else is a protocol failure and yields `None`.
    pub fn from_value(value: &Value) -> Option<Directive> {
        let obj = value.as_object()?;

        if let Some(name) = obj.get("tool").and_then(Value::as_str) {
            let args = obj
                .get("args")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            return Some(Directive::ToolCall {
                name: name.to_string(),
                args,
            });
        }

        match obj.get("final") {
            Some(Value::String(text)) => Some(Directive::FinalAnswer(text.clone())),
            Some(other) => Some(Directive::FinalAnswer(other.to_string())),
            None => None,
        }
    }

    /// Serialize back to the wire shape the model was asked for.
    pub fn to_wire(&self) -> String {
        match self {
            Directive::ToolCall { name, args } => serde_json::json!({
                "tool": name,
                "args": args,
            })
            .to_string(),
            Directive::FinalAnswer(text) => serde_json::json!({ "final": text }).to_string(),
        }
    }
}

/// Recover the last well-formed top-level JSON object embedded in `text`.
///
/// Scans left to right tracking brace depth: a start index is recorded on
/// every 0 -> 1 transition and each return to depth 0 attempts a parse of
/// the enclosed substring. The last substring that parses to an object
/// wins; malformed fragments are skipped silently. Braces inside string
/// literals are not special-cased, a known limitation.
pub fn extract_last_object(text: &str) -> Option<Value> {
    let mut start = None;
    let mut depth = 0usize;
    let mut last = None;

    for (i, ch) in text.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start {
                            let frag = &text[s..i + 1];
                            if let Ok(value) = serde_json::from_str::<Value>(frag) {
                                if value.is_object() {
                                    last = Some(value);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    last
}

/// Extract the last directive from raw model text, if any.
pub fn extract_directive(text: &str) -> Option<Directive> {
    extract_last_object(text).and_then(|v| Directive::from_value(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let text = "Sure! Here you go:\n{\"final\": \"42\"}\nHope that helps.";
        let value = extract_last_object(text).unwrap();
        assert_eq!(value["final"], "42");
    }

    #[test]
    fn last_of_two_objects_wins() {
        let text = "{\"final\": \"first\"} some chatter {\"final\": \"second\"}";
        let value = extract_last_object(text).unwrap();
        assert_eq!(value["final"], "second");
    }

    #[test]
    fn no_balanced_braces_yields_none() {
        assert!(extract_last_object("no json here").is_none());
        assert!(extract_last_object("{unclosed").is_none());
        assert!(extract_last_object("").is_none());
    }

    #[test]
    fn malformed_fragment_is_skipped() {
        let text = "{not json} but {\"tool\": \"calc\", \"args\": {\"expr\": \"1+1\"}}";
        let directive = extract_directive(text).unwrap();
        match directive {
            Directive::ToolCall { name, args } => {
                assert_eq!(name, "calc");
                assert_eq!(args["expr"], "1+1");
            }
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn nested_object_parses_as_one_candidate() {
        let text = "{\"tool\": \"write_file\", \"args\": {\"path\": \"a.txt\", \"text\": \"hi\"}}";
        let directive = extract_directive(text).unwrap();
        match directive {
            Directive::ToolCall { name, args } => {
                assert_eq!(name, "write_file");
                assert_eq!(args["text"], "hi");
            }
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn tool_without_args_gets_empty_map() {
        let value: Value = serde_json::from_str("{\"tool\": \"find_number\"}").unwrap();
        match Directive::from_value(&value).unwrap() {
            Directive::ToolCall { name, args } => {
                assert_eq!(name, "find_number");
                assert!(args.is_empty());
            }
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn neither_shape_is_rejected() {
        let value: Value = serde_json::from_str("{\"route\": \"chat\"}").unwrap();
        assert!(Directive::from_value(&value).is_none());
    }

    #[test]
    fn non_string_final_is_stringified() {
        let value: Value = serde_json::from_str("{\"final\": 7}").unwrap();
        assert_eq!(
            Directive::from_value(&value).unwrap(),
            Directive::FinalAnswer("7".into())
        );
    }
}
