pub mod commands;
pub mod runner;

pub use commands::{DirectCommand, SessionMode};
pub use runner::Agent;
