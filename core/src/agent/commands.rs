//! Deterministic short-circuit layer
//!
//! Literal command grammars, a natural-language read shortcut, and
//! session-mode sentinels that bypass the model entirely. First match
//! wins and the match is independent of any model state.

use lazy_static::lazy_static;
use regex::Regex;

/// Sentinel forcing agent/tool-consideration mode for one request
pub const SENTINEL_AGENT: &str = "<|agent|>";
/// Prefix alias for [`SENTINEL_AGENT`]
pub const AGENT_PREFIX: &str = "agent:";
/// Sentinel forcing plain conversational mode for one request
pub const SENTINEL_CHAT: &str = "<|chat|>";

lazy_static! {
    static ref RE_READ: Regex = Regex::new(r"(?i)^!read\s+(.+)$").unwrap();
    static ref RE_WRITE: Regex = Regex::new(r"(?is)^!write\s+(\S+)\s+<<<\s*(.*)$").unwrap();
    static ref RE_CALC: Regex = Regex::new(r"(?i)^!calc\s+(.+)$").unwrap();
    static ref RE_NUM: Regex = Regex::new(r"(?i)^!num\s+(.+)$").unwrap();
    static ref RE_WHAT_IS_IN: Regex =
        Regex::new(r"(?i)^what\s+is\s+in\s+([A-Za-z0-9._/\-]+\.txt)\s*\??$").unwrap();
}

/// A literal command matched without consulting the model.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectCommand {
    Read { path: String },
    Write { path: String, text: String },
    Calc { expr: String },
    FindNumber { text: String },
}

impl DirectCommand {
    /// Match `input` against the ordered literal grammars.
    pub fn parse(input: &str) -> Option<DirectCommand> {
        if let Some(caps) = RE_READ.captures(input) {
            return Some(DirectCommand::Read {
                path: caps[1].trim().to_string(),
            });
        }
        if let Some(caps) = RE_WRITE.captures(input) {
            return Some(DirectCommand::Write {
                path: caps[1].to_string(),
                text: caps[2].to_string(),
            });
        }
        if let Some(caps) = RE_CALC.captures(input) {
            return Some(DirectCommand::Calc {
                expr: caps[1].trim().to_string(),
            });
        }
        if let Some(caps) = RE_NUM.captures(input) {
            return Some(DirectCommand::FindNumber {
                text: caps[1].to_string(),
            });
        }
        // Natural-language read of a .txt file is deterministic too.
        if let Some(caps) = RE_WHAT_IS_IN.captures(input) {
            return Some(DirectCommand::Read {
                path: caps[1].to_string(),
            });
        }
        None
    }
}

/// Session mode forced by a sentinel prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// No sentinel: normal routing
    Route,
    /// Tool consideration forced, confidence gate skipped
    ForcedAgent,
    /// Plain conversational mode, routing skipped
    ForcedChat,
}

/// Strip a leading sentinel and report the mode it forces.
pub fn strip_sentinel(input: &str) -> (SessionMode, &str) {
    if let Some(rest) = input.strip_prefix(SENTINEL_AGENT) {
        return (SessionMode::ForcedAgent, rest.trim_start());
    }
    if let Some(head) = input.get(..AGENT_PREFIX.len()) {
        if head.eq_ignore_ascii_case(AGENT_PREFIX) {
            return (
                SessionMode::ForcedAgent,
                input[AGENT_PREFIX.len()..].trim_start(),
            );
        }
    }
    if let Some(rest) = input.strip_prefix(SENTINEL_CHAT) {
        return (SessionMode::ForcedChat, rest.trim_start());
    }
    (SessionMode::Route, input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_grammar_matches_case_insensitively() {
        assert_eq!(
            DirectCommand::parse("!READ  notes.txt "),
            Some(DirectCommand::Read {
                path: "notes.txt".into()
            })
        );
    }

    #[test]
    fn write_grammar_captures_multiline_payload() {
        let cmd = DirectCommand::parse("!write out.txt <<< line one\nline two").unwrap();
        assert_eq!(
            cmd,
            DirectCommand::Write {
                path: "out.txt".into(),
                text: "line one\nline two".into()
            }
        );
    }

    #[test]
    fn calc_and_num_grammars_match() {
        assert_eq!(
            DirectCommand::parse("!calc 2 + 2"),
            Some(DirectCommand::Calc {
                expr: "2 + 2".into()
            })
        );
        assert_eq!(
            DirectCommand::parse("!num room 14b has 3 chairs"),
            Some(DirectCommand::FindNumber {
                text: "room 14b has 3 chairs".into()
            })
        );
    }

    #[test]
    fn plain_text_does_not_match() {
        assert_eq!(DirectCommand::parse("read notes.txt please"), None);
        assert_eq!(DirectCommand::parse("!unknown thing"), None);
    }

    #[test]
    fn what_is_in_txt_is_a_deterministic_read() {
        assert_eq!(
            DirectCommand::parse("What is in notes.txt?"),
            Some(DirectCommand::Read {
                path: "notes.txt".into()
            })
        );
        // Only a whole-request .txt question; anything else goes through
        // routing.
        assert_eq!(DirectCommand::parse("what is in data.csv"), None);
        assert_eq!(DirectCommand::parse("tell me what is in notes.txt"), None);
    }

    #[test]
    fn sentinels_force_modes() {
        assert_eq!(
            strip_sentinel("<|agent|> do the thing"),
            (SessionMode::ForcedAgent, "do the thing")
        );
        assert_eq!(
            strip_sentinel("Agent: do the thing"),
            (SessionMode::ForcedAgent, "do the thing")
        );
        assert_eq!(
            strip_sentinel("<|chat|> hello"),
            (SessionMode::ForcedChat, "hello")
        );
        assert_eq!(strip_sentinel("hello"), (SessionMode::Route, "hello"));
    }
}
