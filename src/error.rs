#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Agent,
    Workspace,
    Config,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Agent => "AGENT",
            ErrorCategory::Workspace => "WORKSPACE",
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Agent => {
                "Install the Cursor CLI (curl https://cursor.com/install -fsS | bash), ensure cursor-agent is on PATH, and set CURSOR_API_KEY."
            }
            ErrorCategory::Workspace => {
                "Pass --workspace <dir> pointing at an existing project directory."
            }
            ErrorCategory::Config => {
                "Check the profile config file (--config-path) for valid TOML and known field names."
            }
            ErrorCategory::Input => "Run agent-squared --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }

    /// Process exit code for this category. Distinct codes let scripts tell
    /// a missing/timed-out agent CLI apart from bad invocations.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Input => 2,
            ErrorCategory::Workspace => 3,
            ErrorCategory::Config => 4,
            ErrorCategory::Agent => 5,
            ErrorCategory::Internal => 1,
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("cursor-agent")
        || msg.contains("timed out")
        || msg.contains("api_key")
        || msg.contains("api key")
    {
        return ErrorCategory::Agent;
    }

    if msg.contains("workspace") {
        return ErrorCategory::Workspace;
    }

    if msg.contains("profile") || msg.contains("config") || msg.contains("toml") {
        return ErrorCategory::Config;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("agent '")
        || msg.contains("failed to read input")
    {
        return ErrorCategory::Input;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!("[{}] {:#}\nHint: {}", category.code(), err, category.hint())
}
