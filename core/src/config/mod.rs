//! Configuration management
//!
//! YAML configuration loaded from `~/.config/waymark/waymark.yaml`. A
//! missing file means full defaults; a first run writes the defaults out
//! so they are discoverable.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "waymark.yaml";

/// Default config directory name
const CONFIG_DIR_NAME: &str = "waymark";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// LLM endpoint settings
    #[serde(default)]
    pub endpoint: EndpointSettings,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Project root all filesystem tools are confined to.
    ///
    /// - None => the process working directory
    /// - Some(p) => p
    #[serde(default)]
    pub sandbox_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: EndpointSettings::default(),
            agent: AgentSettings::default(),
            sandbox_root: None,
        }
    }
}

/// LLM endpoint configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndpointSettings {
    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier as loaded on the endpoint
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; local endpoints accept any value
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        EndpointSettings {
            base_url: default_base_url(),
            model: default_model(),
            api_key: default_api_key(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_model() -> String {
    "qwen2.5-vl-3b-instruct".to_string()
}

fn default_api_key() -> Option<String> {
    Some("lm-studio".to_string())
}

/// Agent loop configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentSettings {
    /// Maximum planning iterations per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Router classifications below this confidence fall through to
    /// heuristics
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// File the bootstrap pre-fetch falls back to when a request says
    /// "file" without naming one
    #[serde(default = "default_bootstrap_file")]
    pub bootstrap_file: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettings {
            max_iterations: default_max_iterations(),
            confidence_threshold: default_confidence_threshold(),
            bootstrap_file: default_bootstrap_file(),
        }
    }
}

fn default_max_iterations() -> usize {
    40
}

fn default_confidence_threshold() -> f32 {
    0.6
}

fn default_bootstrap_file() -> String {
    "notes.txt".to_string()
}

impl Config {
    /// Path of the config file
    pub fn config_path() -> Result<PathBuf> {
        let dir = config_dir()
            .context("could not determine config directory")?
            .join(CONFIG_DIR_NAME);
        Ok(dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration, writing defaults on first run.
    pub fn load() -> Result<Config> {
        let path = Self::config_path()?;
        if !path.exists() {
            let config = Config::default();
            config.save().ok();
            return Ok(config);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Persist configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_yml::to_string(self).context("failed to serialize config")?;
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Effective sandbox root.
    pub fn resolve_sandbox_root(&self) -> PathBuf {
        self.sandbox_root
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}
