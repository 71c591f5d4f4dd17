//! `waymark` - a local-first terminal agent
//!
//! This binary wires the core agent to an OpenAI-compatible endpoint and
//! exposes it as a one-shot CLI or an interactive loop.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use crate::cli::Cli;
use waymark_core::config::Config;
use waymark_core::llm::{LlmClient, LlmConfig};
use waymark_core::Agent;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(root) = &args.root {
        config.sandbox_root = Some(root.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.endpoint.base_url = base_url.clone();
    }
    if let Some(model) = &args.model {
        config.endpoint.model = model.clone();
    }
    if let Some(max_iterations) = args.max_iterations {
        config.agent.max_iterations = max_iterations;
    }

    let mut llm_config = LlmConfig::new(
        config.endpoint.base_url.clone(),
        config.endpoint.model.clone(),
    );
    if let Some(api_key) = &config.endpoint.api_key {
        llm_config = llm_config.with_api_key(api_key.clone());
    }
    let client = Arc::new(LlmClient::new(llm_config).context("Failed to build LLM client")?);
    tracing::debug!(model = client.model(), base_url = %config.endpoint.base_url, "endpoint configured");

    let mut agent = Agent::new(client, &config);

    if !args.query.is_empty() {
        let query = args.query.join(" ");
        let reply = agent
            .run_query(&query)
            .await
            .context("query failed")?;
        println!("{reply}");
        return Ok(());
    }

    cli::repl::run(&mut agent).await
}
