use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;
use crate::workspace::mask_api_key;

pub const DEFAULT_MODEL: &str = "composer-1";
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_MCP_STEP_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 2000;
pub const DEFAULT_MAX_COMPOSER_OUTPUT_CHARS: usize = 1500;
pub const DEFAULT_MAX_MODIFIED_FILES_SHOWN: usize = 20;
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 10;

/// Environment variable that overrides the custom agents directory.
pub const CUSTOM_AGENTS_ENV_VAR: &str = "AGENT_SQUARED_AGENTS_DIR";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub model: String,
    pub workspace: Option<String>,
    pub agent_timeout_secs: u64,
    pub mcp_step_timeout_secs: u64,
    pub max_output_chars: usize,
    pub max_composer_output_chars: usize,
    pub max_modified_files_shown: usize,
    pub git_timeout_secs: u64,
    pub instructions_dir: String,
    pub plans_dir: Option<String>,
    pub custom_agents_dir: Option<PathBuf>,
    pub api_key: Option<String>,
    pub show_sensitive_config: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub model: Option<String>,
    pub agent_timeout_secs: Option<u64>,
    pub mcp_step_timeout_secs: Option<u64>,
    pub max_output_chars: Option<usize>,
    pub max_composer_output_chars: Option<usize>,
    pub max_modified_files_shown: Option<usize>,
    pub git_timeout_secs: Option<u64>,
    pub instructions_dir: Option<String>,
    pub plans_dir: Option<String>,
    pub custom_agents_dir: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check field names and value types.",
            path.display()
        )
    })
}

/// Default location for custom user agents: `~/.agent-squared/agents`.
pub fn default_custom_agents_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .map(|home| home.join(".agent-squared/agents"))
}

/// Resolves the custom agents directory, if one exists on disk.
///
/// Precedence: profile setting, then `AGENT_SQUARED_AGENTS_DIR`, then the
/// default home location. A configured path that does not exist is reported
/// with a warning and skipped.
pub fn resolve_custom_agents_dir(profile_dir: Option<&str>) -> Option<PathBuf> {
    let candidates = profile_dir
        .map(|dir| PathBuf::from(dir))
        .into_iter()
        .chain(std::env::var(CUSTOM_AGENTS_ENV_VAR).ok().map(PathBuf::from))
        .chain(default_custom_agents_dir());

    for candidate in candidates {
        if candidate.is_dir() {
            return Some(candidate);
        }
        tracing::debug!(dir = %candidate.display(), "custom agents directory not found");
    }
    None
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let custom_agents_dir = resolve_custom_agents_dir(profile.custom_agents_dir.as_deref());

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        model: cli
            .model
            .clone()
            .or(profile.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        workspace: cli.workspace.clone(),
        agent_timeout_secs: cli
            .agent_timeout_secs
            .or(profile.agent_timeout_secs)
            .unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS)
            .max(1),
        mcp_step_timeout_secs: profile
            .mcp_step_timeout_secs
            .unwrap_or(DEFAULT_MCP_STEP_TIMEOUT_SECS)
            .max(1),
        max_output_chars: profile
            .max_output_chars
            .unwrap_or(DEFAULT_MAX_OUTPUT_CHARS)
            .max(128),
        max_composer_output_chars: profile
            .max_composer_output_chars
            .unwrap_or(DEFAULT_MAX_COMPOSER_OUTPUT_CHARS)
            .max(128),
        max_modified_files_shown: profile
            .max_modified_files_shown
            .unwrap_or(DEFAULT_MAX_MODIFIED_FILES_SHOWN)
            .max(1),
        git_timeout_secs: profile
            .git_timeout_secs
            .unwrap_or(DEFAULT_GIT_TIMEOUT_SECS)
            .max(1),
        instructions_dir: profile
            .instructions_dir
            .unwrap_or_else(|| "agents".to_string()),
        plans_dir: profile.plans_dir,
        custom_agents_dir,
        api_key: std::env::var("CURSOR_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty()),
        show_sensitive_config: cli.show_sensitive_config,
    })
}

pub fn display_api_key(cfg: &RuntimeConfig) -> String {
    match cfg.api_key.as_deref() {
        None => "<not set>".to_string(),
        Some(key) if cfg.show_sensitive_config => key.to_string(),
        Some(key) => mask_api_key(key),
    }
}
