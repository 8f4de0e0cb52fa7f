use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

/// Resolves and validates the workspace directory the external agent runs in.
///
/// `None` resolves to the current directory so the agent sees whatever
/// project the user launched from.
pub fn resolve_workspace(requested: Option<&str>) -> Result<PathBuf> {
    let Some(raw) = requested.map(str::trim).filter(|value| !value.is_empty()) else {
        return std::env::current_dir()
            .map_err(|err| anyhow::anyhow!("failed to resolve current workspace directory: {err}"));
    };

    let path = PathBuf::from(raw);
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "workspace directory does not exist: {}",
            path.display()
        ));
    }
    if !path.is_dir() {
        return Err(anyhow::anyhow!(
            "workspace path is not a directory: {}",
            path.display()
        ));
    }
    Ok(path)
}

/// Lists files changed against HEAD via `git diff --name-only`.
///
/// Any failure (no git binary, not a repository, timeout) yields an empty
/// list; the modified-files section of a report is best effort.
pub async fn modified_files(workspace_dir: &Path, timeout_secs: u64) -> Vec<String> {
    let diff = tokio::process::Command::new("git")
        .args(["diff", "--name-only", "HEAD"])
        .current_dir(workspace_dir)
        .output();

    let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), diff).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            tracing::debug!(status = ?output.status.code(), "git diff returned non-zero");
            return Vec::new();
        }
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "git diff could not be launched");
            return Vec::new();
        }
        Err(_) => {
            tracing::debug!(timeout_secs, "git diff timed out");
            return Vec::new();
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Masks an API key for display, keeping the first 8 and last 4 characters.
pub fn mask_api_key(api_key: &str) -> String {
    if api_key.chars().count() > 12 {
        let head = api_key.chars().take(8).collect::<String>();
        let tail_start = api_key.chars().count() - 4;
        let tail = api_key.chars().skip(tail_start).collect::<String>();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
