//! Planner / router
//!
//! One low-temperature model turn classifies a request: tool or chat,
//! which tool, with which arguments, and how confident the model is.
//! The reply is expected to be a single JSON object but is recovered
//! leniently, and a plan that fails validation never aborts the request:
//! the caller decides whether to fall through to heuristics.

use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatRequest, CompletionProvider};
use crate::protocol::{self, Directive};
use crate::tools::ToolRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Routing instruction sent as the system prompt.
const PLANNER_SYSTEM: &str = "You are a router. Decide how to handle the user's request.\n\
Return ONE JSON object only with keys: route, tool, args, confidence.\n\
- route: 'tool' or 'chat'\n\
- tool: one of ['read_file','write_file','calc','find_number'] or null when route='chat'\n\
- args: object of arguments for the chosen tool ({} if none)\n\
- confidence: float 0.0..1.0 (your certainty)\n\
No prose. No markdown. JSON only.";

const PLANNER_MAX_TOKENS: u32 = 200;

/// High-level choice between invoking a tool and answering directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tool,
    Chat,
}

/// The router's classification of one request.
///
/// Soft invariant: `tool` is `None` when the route is `Chat`; violations
/// are tolerated rather than rejected.
#[derive(Debug, Clone)]
pub struct Plan {
    pub route: Option<Route>,
    pub tool: Option<String>,
    pub args: Map<String, Value>,
    pub confidence: f32,
}

impl Plan {
    /// A plan nothing could be parsed from.
    pub fn empty() -> Self {
        Plan {
            route: None,
            tool: None,
            args: Map::new(),
            confidence: 0.0,
        }
    }

    /// Build a plan from a loosely-shaped JSON object.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Plan::empty();
        };

        let route = obj
            .get("route")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .and_then(|s| match s.as_str() {
                "tool" => Some(Route::Tool),
                "chat" => Some(Route::Chat),
                _ => None,
            });

        let tool = obj
            .get("tool")
            .and_then(Value::as_str)
            .map(str::to_string);

        let args = obj
            .get("args")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Plan {
            route,
            tool,
            args,
            confidence: coerce_confidence(obj.get("confidence")),
        }
    }

    /// The tool directive this plan proposes, if it survives whitelist
    /// and argument-presence validation.
    pub fn valid_directive(&self, registry: &ToolRegistry) -> Option<Directive> {
        let name = self.tool.as_deref()?;
        if !registry.validate(name, &self.args) {
            return None;
        }
        Some(Directive::ToolCall {
            name: name.to_string(),
            args: self.args.clone(),
        })
    }
}

/// Coerce a confidence value to a float, defaulting to 0.0 on any
/// conversion failure.
fn coerce_confidence(value: Option<&Value>) -> f32 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
        Some(Value::String(s)) => s.trim().parse::<f32>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Asks the model to classify a request.
pub struct Planner {
    provider: Arc<dyn CompletionProvider>,
}

impl Planner {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Planner { provider }
    }

    /// Run the routing turn for `query`.
    ///
    /// The full response is parsed as JSON first; on failure the embedded
    /// last-object extractor takes over; if that fails too the plan is
    /// empty (confidence 0.0) rather than an error.
    pub async fn plan(&self, query: &str) -> Result<Plan, AgentError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(PLANNER_SYSTEM),
            ChatMessage::user(query),
        ])
        .with_temperature(0.0)
        .with_max_tokens(PLANNER_MAX_TOKENS);

        let raw = self.provider.complete(&request).await?;
        let raw = raw.trim();

        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            if value.is_object() {
                return Ok(Plan::from_value(&value));
            }
        }
        match protocol::extract_last_object(raw) {
            Some(value) => Ok(Plan::from_value(&value)),
            None => {
                tracing::debug!("router reply had no parseable plan");
                Ok(Plan::empty())
            }
        }
    }
}
