//! Heuristic fallback ("autowrap")
//!
//! When the model fails to produce a usable directive, deterministic
//! inference over the raw request takes over. Rules run in a fixed order,
//! first match wins, and the function is total: it always returns exactly
//! one directive and never fails.

use crate::protocol::Directive;
use crate::session::SessionMemory;
use crate::tools::Sandbox;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Accepts paths like notes.txt, logs/app.log, ./foo.bar.gz
    static ref PATH_RE: Regex =
        Regex::new(r"(?:\./|/)?[A-Za-z0-9._/\-]+\.[A-Za-z0-9]{1,8}").unwrap();
    static ref TOKEN_RE: Regex = Regex::new(r"[A-Za-z0-9._/\-]+").unwrap();
    static ref TAIL_EXPR_RE: Regex = Regex::new(r"([-+/*()\s.\d^]+)$").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"\d").unwrap();
}

/// Cap on final answers passed through from raw model text.
const MAX_ANSWER_CHARS: usize = 4000;

/// Strip trailing punctuation a sentence tends to glue onto a path.
fn strip_trailing_punctuation(token: &str) -> &str {
    token.trim_end_matches(|c| ".,!?:;'\")".contains(c))
}

/// First explicit path-with-extension literal in `text`.
pub fn first_path_in(text: &str) -> Option<String> {
    PATH_RE
        .find(text)
        .map(|m| strip_trailing_punctuation(m.as_str()).to_string())
}

/// Infer exactly one directive from raw model text and the request.
///
/// `raw` may be empty (e.g. when the router proposed a tool but the
/// directive was invalid and no model text exists yet). Filename
/// declarations in the request are learned into `memory` before any rule
/// is tried, regardless of which rule wins.
pub fn autowrap(
    raw: &str,
    query: &str,
    memory: &mut SessionMemory,
    sandbox: &Sandbox,
) -> Directive {
    let raw = raw.trim();
    let query = query.trim();

    // 1. Memory-learn side effect, always applied.
    memory.learn_from(query);

    // 2. Direct JSON pass-through.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        if let Some(directive) = Directive::from_value(&value) {
            return directive;
        }
    }

    // 3. Explicit path-like name with extension.
    if let Some(path) = first_path_in(query) {
        return Directive::tool_call("read_file", "path", path);
    }

    // 4. Known file mentioned by bare name.
    if let Some(name) = memory.recall(query) {
        return Directive::tool_call("read_file", "path", name.to_string());
    }

    // 5. Filesystem probe over request tokens.
    for token in TOKEN_RE.find_iter(query) {
        if let Ok(resolved) = sandbox.resolve(token.as_str()) {
            if resolved.is_file() {
                return Directive::tool_call("read_file", "path", token.as_str());
            }
        }
    }

    // 6. Arithmetic intent: trailing expression with at least one digit.
    if let Some(caps) = TAIL_EXPR_RE.captures(query) {
        let tail = caps[1].trim();
        if DIGIT_RE.is_match(tail) {
            return Directive::tool_call("calc", "expr", tail.to_string());
        }
    }

    // 7. Default: pass the raw text through, length-capped.
    if raw.is_empty() {
        Directive::FinalAnswer("(no output)".into())
    } else {
        Directive::FinalAnswer(raw.chars().take(MAX_ANSWER_CHARS).collect())
    }
}
