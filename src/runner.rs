use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;

/// Name of the external AI agent executable this orchestrator drives.
pub const AGENT_BINARY: &str = "cursor-agent";

pub const AGENT_INSTALL_HINT: &str =
    "cursor-agent not found. Install with: curl https://cursor.com/install -fsS | bash";

/// Install locations checked after PATH.
fn fallback_binary_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(&home).join(".local/bin").join(AGENT_BINARY));
        paths.push(PathBuf::from(&home).join(".cursor/bin").join(AGENT_BINARY));
    }
    paths.push(PathBuf::from("/usr/local/bin").join(AGENT_BINARY));
    paths
}

/// Locates the agent executable on PATH, then in common install locations.
pub fn find_agent_binary() -> Result<PathBuf> {
    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(AGENT_BINARY);
            if is_executable(&candidate) {
                return Ok(candidate);
            }
        }
    }

    for candidate in fallback_binary_paths() {
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    Err(anyhow::anyhow!(AGENT_INSTALL_HINT))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && std::fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// One call to the external agent CLI.
#[derive(Debug, Clone)]
pub struct AgentInvocation<'a> {
    pub prompt: &'a str,
    pub instructions: Option<&'a str>,
    pub model: &'a str,
    pub output_format: &'a str,
    pub workspace_dir: Option<&'a Path>,
    pub timeout_secs: u64,
    pub api_key: Option<&'a str>,
}

impl<'a> AgentInvocation<'a> {
    /// Role instructions are prepended so the external CLI sees one prompt.
    pub fn full_prompt(&self) -> String {
        match self.instructions.map(str::trim).filter(|text| !text.is_empty()) {
            Some(instructions) => {
                format!("{instructions}\n\nUser Request: {}", self.prompt)
            }
            None => self.prompt.to_string(),
        }
    }

    /// Arguments for a non-interactive (`-p`) call.
    pub fn print_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(key) = self.api_key {
            args.push("--api-key".to_string());
            args.push(key.to_string());
        }
        args.push("-p".to_string());
        args.push(self.full_prompt());
        args.push("--output-format".to_string());
        args.push(self.output_format.to_string());
        args.push("--model".to_string());
        args.push(self.model.to_string());
        // Auto-approve commands; the pipeline is unattended.
        args.push("--force".to_string());
        args
    }

    /// Arguments for an interactive call (positional prompt, UI attached).
    pub fn interactive_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(key) = self.api_key {
            args.push("--api-key".to_string());
            args.push(key.to_string());
        }
        args.push("--model".to_string());
        args.push(self.model.to_string());
        args.push(self.full_prompt());
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRunStatus {
    Completed(i32),
    TimedOut,
    BinaryNotFound,
    LaunchFailed,
}

impl AgentRunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, AgentRunStatus::Completed(0))
    }
}

#[derive(Debug, Clone)]
pub struct AgentRunResult {
    pub stdout: String,
    pub error: Option<String>,
    pub status: AgentRunStatus,
}

/// Runs the agent CLI non-interactively and captures stdout.
///
/// The child's stderr is discarded: agent CLIs print progress noise there
/// and this process may be speaking JSON-RPC on its own stdio. Every failure
/// mode maps to a typed status instead of an error so the pipeline can
/// degrade per step.
pub async fn run_agent_detailed(invocation: &AgentInvocation<'_>) -> AgentRunResult {
    let binary = match find_agent_binary() {
        Ok(binary) => binary,
        Err(err) => {
            return AgentRunResult {
                stdout: String::new(),
                error: Some(err.to_string()),
                status: AgentRunStatus::BinaryNotFound,
            };
        }
    };

    let mut command = tokio::process::Command::new(&binary);
    command
        .args(invocation.print_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(workspace) = invocation.workspace_dir {
        command.current_dir(workspace);
    }

    tracing::debug!(
        binary = %binary.display(),
        model = invocation.model,
        timeout_secs = invocation.timeout_secs,
        "running agent CLI"
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(invocation.timeout_secs),
        command.output(),
    )
    .await;

    match outcome {
        Ok(Ok(output)) => {
            let code = output.status.code().unwrap_or(-1);
            if code != 0 {
                tracing::warn!(code, "agent CLI returned non-zero exit code");
            }
            AgentRunResult {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                error: None,
                status: AgentRunStatus::Completed(code),
            }
        }
        Ok(Err(err)) => AgentRunResult {
            stdout: String::new(),
            error: Some(format!("error running {AGENT_BINARY}: {err}")),
            status: AgentRunStatus::LaunchFailed,
        },
        Err(_) => AgentRunResult {
            stdout: String::new(),
            error: Some(format!(
                "agent execution timed out after {} seconds",
                invocation.timeout_secs
            )),
            status: AgentRunStatus::TimedOut,
        },
    }
}

/// Convenience wrapper that returns captured stdout only.
///
/// Failures degrade to an empty string with a warning; the pipeline keeps
/// moving and downstream parsers apply their fallbacks.
pub async fn run_agent(invocation: &AgentInvocation<'_>) -> String {
    let result = run_agent_detailed(invocation).await;
    if let Some(error) = &result.error {
        tracing::warn!(status = ?result.status, error = %error, "agent call failed");
    }
    result.stdout
}

/// Hands the terminal to the agent CLI (opens its interactive UI).
pub async fn run_agent_interactive(invocation: &AgentInvocation<'_>) -> Result<()> {
    let binary = find_agent_binary()?;

    let mut command = tokio::process::Command::new(&binary);
    command.args(invocation.interactive_args());
    if let Some(workspace) = invocation.workspace_dir {
        command.current_dir(workspace);
    }

    let status = command
        .status()
        .await
        .map_err(|err| anyhow::anyhow!("failed to launch {AGENT_BINARY} interactively: {err}"))?;
    if !status.success() {
        tracing::warn!(code = ?status.code(), "interactive agent session ended with non-zero status");
    }
    Ok(())
}
