//! CLI argument parsing using clap 4.x derive macros

pub mod repl;

use clap::Parser;
use std::path::PathBuf;

/// A local-first terminal agent that routes requests to sandboxed tools
/// or chat
///
/// Works with OpenAI-compatible endpoints (LM Studio, Ollama, local
/// models). With a query on the command line it answers once and exits;
/// without one it starts the interactive loop.
#[derive(Parser, Debug)]
#[command(name = "waymark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Direct one-shot query (omit to start the interactive loop)
    #[arg(num_args = 0..)]
    pub query: Vec<String>,

    /// Project root the file tools are confined to (overrides config)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Endpoint base URL (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model identifier (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum agent loop iterations (overrides config)
    #[arg(long)]
    pub max_iterations: Option<usize>,
}
