//! Sandboxed filesystem tools
//!
//! All tool paths resolve relative to a single project root. A resolution
//! that escapes the root fails closed with a sandbox violation; it is
//! never clamped back inside.

use super::{require_str, Tool};
use crate::error::AgentError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};

/// Read results are truncated to this many characters.
pub const MAX_READ_CHARS: usize = 8000;

/// Confinement of filesystem operations to one project root.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new(root: &Path) -> Self {
        // Canonicalize so the escape check compares real prefixes.
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Sandbox { root }
    }

    /// The project root all paths are confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root, rejecting any resolution that
    /// lands outside it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let normalized = normalize(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(AgentError::SandboxViolation {
                path: path.to_string(),
            });
        }
        Ok(normalized)
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem, so
/// paths to files that do not exist yet still normalize.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Read a file inside the sandbox, truncated to [`MAX_READ_CHARS`].
pub struct ReadFile {
    sandbox: Sandbox,
}

impl ReadFile {
    pub fn new(sandbox: Sandbox) -> Self {
        ReadFile { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "read a file from the project directory"
    }

    fn usage(&self) -> &str {
        "read_file(path)"
    }

    fn required_args(&self) -> &[&str] {
        &["path"]
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, AgentError> {
        let path = require_str(self.name(), args, "path")?;
        let resolved = self.sandbox.resolve(&path)?;
        if !resolved.is_file() {
            return Err(AgentError::NotFound { path });
        }
        let bytes = tokio::fs::read(&resolved).await?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(truncate_chars(&content, MAX_READ_CHARS))
    }
}

/// Write (overwrite) a file inside the sandbox.
pub struct WriteFile {
    sandbox: Sandbox,
}

impl WriteFile {
    pub fn new(sandbox: Sandbox) -> Self {
        WriteFile { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "overwrite a file in the project directory"
    }

    fn usage(&self) -> &str {
        "write_file(path, text)"
    }

    fn required_args(&self) -> &[&str] {
        &["path", "text"]
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, AgentError> {
        let path = require_str(self.name(), args, "path")?;
        // An empty payload is a legitimate write.
        let text = match args.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(AgentError::InvalidArgument {
                    tool: self.name().to_string(),
                    key: "text".to_string(),
                })
            }
        };
        let resolved = self.sandbox.resolve(&path)?;
        tokio::fs::write(&resolved, &text).await?;
        Ok(format!("[wrote {} chars to {}]", text.chars().count(), path))
    }
}

fn truncate_chars(text: &str, cap: usize) -> String {
    text.chars().take(cap).collect()
}
