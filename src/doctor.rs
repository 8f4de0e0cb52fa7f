use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::output::{OutputBuilder, truncate_output};
use crate::runner::{AGENT_BINARY, find_agent_binary};
use crate::workspace::{mask_api_key, resolve_workspace};

const VERSION_PROBE_TIMEOUT_SECS: u64 = 10;
const SMOKE_CALL_TIMEOUT_SECS: u64 = 30;

fn mcp_config_example() -> String {
    [
        "{",
        "  \"mcpServers\": {",
        "    \"agent-squared\": {",
        "      \"command\": \"agent-squared\",",
        "      \"args\": [\"serve\"],",
        "      \"env\": {",
        "        \"CURSOR_API_KEY\": \"your-api-key-here\"",
        "      }",
        "    }",
        "  }",
        "}",
    ]
    .join("\n")
}

pub(crate) async fn probe_version(binary: &Path) -> String {
    let outcome = tokio::time::timeout(
        Duration::from_secs(VERSION_PROBE_TIMEOUT_SECS),
        tokio::process::Command::new(binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match outcome {
        Ok(Ok(output)) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            format!("Version: `{version}`")
        }
        Ok(Ok(output)) => {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut lines = vec![format!("Version check returned code {code}")];
            if !stderr.trim().is_empty() {
                lines.push(format!("   stderr: {}", truncate_output(stderr.trim(), 200)));
            }
            lines.join("\n")
        }
        Ok(Err(err)) => format!("Version check error: {err}"),
        Err(_) => "Version check timed out".to_string(),
    }
}

async fn probe_agent_call(cfg: &RuntimeConfig, binary: &Path, workspace_dir: &Path) -> String {
    let mut args: Vec<String> = Vec::new();
    if let Some(key) = cfg.api_key.as_deref() {
        args.push("--api-key".to_string());
        args.push(key.to_string());
    }
    args.extend(
        ["-p", "Say hello", "--output-format", "text", "--force"]
            .iter()
            .map(|arg| arg.to_string()),
    );

    let display_args = args
        .iter()
        .enumerate()
        .map(|(index, arg)| {
            if index > 0 && args[index - 1] == "--api-key" {
                "***".to_string()
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<String>>()
        .join(" ");

    let mut lines = vec![
        format!("**Command:** `{} {display_args}`", binary.display()),
        format!("**Working dir:** `{}`", workspace_dir.display()),
        String::new(),
        "**Environment:**".to_string(),
        format!(
            "- CURSOR_API_KEY: {}",
            if cfg.api_key.is_some() { "set" } else { "NOT SET" }
        ),
        String::new(),
    ];

    let start = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(SMOKE_CALL_TIMEOUT_SECS),
        tokio::process::Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(workspace_dir)
            .kill_on_drop(true)
            .output(),
    )
    .await;
    let elapsed = start.elapsed().as_secs_f64();

    match outcome {
        Ok(Ok(output)) => {
            let code = output.status.code().unwrap_or(-1);
            lines.push(format!("**Completed in:** {elapsed:.1}s"));
            lines.push(format!("**Return code:** {code}"));
            lines.push(String::new());
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if code == 0 {
                lines.push("Agent call succeeded.".to_string());
                lines.push(format!(
                    "**Response:**\n```\n{}\n```",
                    truncate_output(stdout.trim(), 500)
                ));
            } else {
                lines.push("Agent call failed.".to_string());
                if !stdout.trim().is_empty() {
                    lines.push(format!(
                        "**Stdout:**\n```\n{}\n```",
                        truncate_output(&stdout, 500)
                    ));
                }
                if !stderr.trim().is_empty() {
                    lines.push(format!(
                        "**Stderr:**\n```\n{}\n```",
                        truncate_output(&stderr, 500)
                    ));
                }
            }
        }
        Ok(Err(err)) => {
            lines.push(format!("Error launching {AGENT_BINARY}: {err}"));
        }
        Err(_) => {
            lines.push(format!("**Timeout after {elapsed:.1}s**"));
            lines.push(String::new());
            lines.push("**Possible causes:**".to_string());
            lines.push("1. Keychain access issue".to_string());
            lines.push("2. Network connectivity".to_string());
            lines.push(format!("3. {AGENT_BINARY} waiting for input"));
        }
    }

    lines.join("\n")
}

/// Full diagnostic pass: model config, API key, binary discovery, a version
/// probe, and a short live agent call. Shared by the `doctor` subcommand
/// and the MCP diagnostic tool.
pub async fn run_diagnostics(cfg: &RuntimeConfig) -> String {
    let mut output = OutputBuilder::new();
    output.header("Agent\u{b2} Diagnostic");
    output.blank();

    output.add(format!(
        "**Profile**: '{}' (config: {})",
        cfg.profile, cfg.config_path
    ));
    output.add(format!(
        "**Model**: `{}` (set via CURSOR_MODEL env var or profile)",
        cfg.model
    ));
    output.blank();

    match cfg.api_key.as_deref() {
        Some(key) => {
            output.add(format!("CURSOR_API_KEY is set: `{}`", mask_api_key(key)));
            output.blank();
        }
        None => {
            output.add("CURSOR_API_KEY environment variable not set");
            output.blank();
            output.add("**To fix this:**");
            output.numbered(1, "Generate an API key from Cursor Settings");
            output.numbered(2, "Add it to your MCP config in `~/.cursor/mcp.json`:");
            output.code(&mcp_config_example(), "json");
            output.numbered(3, "Restart the host to reload the MCP server");
            return output.build();
        }
    }

    let binary = match find_agent_binary() {
        Ok(binary) => {
            output.add(format!("{AGENT_BINARY} found: `{}`", binary.display()));
            output.blank();
            binary
        }
        Err(_) => {
            output.add(format!("{AGENT_BINARY} not found in PATH or common locations"));
            output.blank();
            output.add("**To fix:**");
            output.numbered(1, "Install Cursor CLI: `curl https://cursor.com/install -fsS | bash`");
            output.numbered(2, &format!("Make sure `{AGENT_BINARY}` is in your PATH"));
            return output.build();
        }
    };

    output.add(probe_version(&binary).await);
    output.blank();

    let workspace_dir = match resolve_workspace(cfg.workspace.as_deref()) {
        Ok(workspace_dir) => workspace_dir,
        Err(err) => {
            output.add(format!("Workspace check failed: {err}"));
            return output.build();
        }
    };

    output.header_level(
        &format!("Testing Agent Call ({SMOKE_CALL_TIMEOUT_SECS}s timeout)..."),
        3,
    );
    output.blank();
    output.add(probe_agent_call(cfg, &binary, &workspace_dir).await);

    output.build()
}

pub async fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    let report = run_diagnostics(cfg).await;
    println!("{report}");
    Ok(())
}
