//! waymark-core
//!
//! The routing and tool-calling engine behind the `waymark` binary.
//! A single request resolves to exactly one outcome: a whitelisted tool
//! invocation or a conversational answer, optionally driven through a
//! bounded multi-turn agent loop.

pub mod agent;
pub mod config;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod protocol;
pub mod router;
pub mod session;
pub mod tools;

// Re-exports for convenience
pub use agent::Agent;
pub use config::Config;
pub use error::AgentError;
pub use protocol::Directive;
