use std::path::{Path, PathBuf};

use crate::config::RuntimeConfig;

/// How an agent is executed: directly with an instruction file, or as a
/// composite that fans out to member agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentKind {
    Instruction { file: PathBuf },
    Composite { members: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub key: String,
    pub display_name: String,
    pub kind: AgentKind,
    pub custom: bool,
}

impl AgentSpec {
    fn instruction(key: &str, display_name: &str, file: &str) -> AgentSpec {
        AgentSpec {
            key: key.to_string(),
            display_name: display_name.to_string(),
            kind: AgentKind::Instruction {
                file: PathBuf::from(file),
            },
            custom: false,
        }
    }

    fn composite(key: &str, members: &[&str]) -> AgentSpec {
        AgentSpec {
            key: key.to_string(),
            display_name: key.to_string(),
            kind: AgentKind::Composite {
                members: members.iter().map(|name| name.to_string()).collect(),
            },
            custom: false,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, AgentKind::Composite { .. })
    }
}

/// Splitter role: decides which specialists a task needs.
pub fn splitter_agent() -> AgentSpec {
    AgentSpec::instruction("splitter", "splitter-agent", "splitter-agent.md")
}

/// Prompt engineer role: refines, categorizes, and plans.
pub fn prompt_engineer_agent() -> AgentSpec {
    AgentSpec::instruction("prompt-engineer", "prompt-engineer", "prompt-engineer.md")
}

/// Composer role: validates that multiple specialists' outputs integrate.
pub fn composer_agent() -> AgentSpec {
    AgentSpec::instruction("composer", "composer", "composer.md")
}

fn core_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec::instruction("frontend", "frontend-developer", "front-end-dev.md"),
        AgentSpec::instruction("backend", "backend-architect", "backend-architect.md"),
        AgentSpec::instruction("cloud", "cloud-architect", "cloud-architect.md"),
        AgentSpec::composite("full-stack", &["backend", "frontend"]),
    ]
}

fn additional_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec::instruction("code-reviewer", "code-reviewer", "code-reviewer.md"),
        AgentSpec::instruction("python-pro", "python-pro", "python-pro.md"),
        AgentSpec::instruction("ui-ux-designer", "ui-ux-designer", "ui-ux-designer.md"),
        AgentSpec::instruction("security-engineer", "security-engineer", "security-engineer.md"),
        AgentSpec::instruction("ai-engineer", "ai-engineer", "ai-engineer.md"),
        AgentSpec::instruction("data-engineer", "data-engineer", "data-engineer.md"),
        AgentSpec::instruction(
            "deployment-engineer",
            "deployment-engineer",
            "deployment-engineer.md",
        ),
        AgentSpec::instruction("composer", "composer", "composer.md"),
    ]
}

/// The full agent catalog: core specialists, additional specialists, and
/// user-supplied custom agents discovered from disk.
#[derive(Debug, Clone)]
pub struct AgentCatalog {
    pub core: Vec<AgentSpec>,
    pub additional: Vec<AgentSpec>,
    pub custom: Vec<AgentSpec>,
}

impl AgentCatalog {
    pub fn load(cfg: &RuntimeConfig) -> AgentCatalog {
        Self::with_custom_dir(cfg.custom_agents_dir.as_deref())
    }

    pub fn with_custom_dir(custom_dir: Option<&Path>) -> AgentCatalog {
        let core = core_agents();
        let additional = additional_agents();
        let custom = custom_dir
            .map(|dir| discover_custom_agents(dir, &core, &additional))
            .unwrap_or_default();
        AgentCatalog {
            core,
            additional,
            custom,
        }
    }

    /// Looks up an agent by catalog key or display name.
    ///
    /// Search order matches lookup precedence: core, additional, custom.
    pub fn lookup(&self, name: &str) -> Option<&AgentSpec> {
        let wanted = name.trim();
        self.core
            .iter()
            .chain(self.additional.iter())
            .chain(self.custom.iter())
            .find(|agent| agent.key == wanted || agent.display_name == wanted)
    }

    /// All catalog keys, in listing order.
    pub fn all_names(&self) -> Vec<String> {
        self.core
            .iter()
            .chain(self.additional.iter())
            .chain(self.custom.iter())
            .map(|agent| agent.key.clone())
            .collect()
    }

    /// Keys of agents that can run standalone as a specialist (composites
    /// are driven through the pipeline, not dispatched directly).
    pub fn specialist_names(&self) -> Vec<String> {
        self.core
            .iter()
            .chain(self.additional.iter())
            .chain(self.custom.iter())
            .filter(|agent| !agent.is_composite())
            .map(|agent| agent.key.clone())
            .collect()
    }
}

fn discover_custom_agents(
    dir: &Path,
    core: &[AgentSpec],
    additional: &[AgentSpec],
) -> Vec<AgentSpec> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "failed to read custom agents directory");
            return Vec::new();
        }
    };

    let mut custom = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if stem.starts_with('.') || path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        let conflicts = core
            .iter()
            .chain(additional.iter())
            .any(|agent| agent.key == stem);
        if conflicts {
            tracing::warn!(agent = stem, "custom agent conflicts with built-in agent, skipping");
            continue;
        }
        tracing::info!(agent = stem, "loaded custom agent");
        custom.push(AgentSpec {
            key: stem.to_string(),
            display_name: stem.to_string(),
            kind: AgentKind::Instruction { file: path.clone() },
            custom: true,
        });
    }

    custom.sort_by(|a, b| a.key.cmp(&b.key));
    custom
}

/// Instructions for a catalog agent, resolved against the runtime config.
/// Composite agents carry no instructions of their own.
pub fn role_instructions(
    cfg: &RuntimeConfig,
    spec: &AgentSpec,
    workspace_dir: Option<&Path>,
) -> String {
    match &spec.kind {
        AgentKind::Instruction { file } => {
            load_agent_instructions(file, &cfg.instructions_dir, workspace_dir)
        }
        AgentKind::Composite { .. } => String::new(),
    }
}

/// Loads an agent instruction file, stripping YAML frontmatter.
///
/// Relative paths resolve against `<workspace>/<instructions_dir>` first and
/// the instructions dir in the current directory second. A missing or
/// unreadable file degrades to empty instructions with a warning; the agent
/// still runs on the bare prompt.
pub fn load_agent_instructions(
    file: &Path,
    instructions_dir: &str,
    workspace_dir: Option<&Path>,
) -> String {
    let candidates: Vec<PathBuf> = if file.is_absolute() {
        vec![file.to_path_buf()]
    } else {
        let mut paths = Vec::new();
        if let Some(workspace) = workspace_dir {
            paths.push(workspace.join(instructions_dir).join(file));
        }
        paths.push(Path::new(instructions_dir).join(file));
        paths
    };

    for candidate in &candidates {
        match std::fs::read_to_string(candidate) {
            Ok(content) => return strip_frontmatter(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                tracing::warn!(file = %candidate.display(), error = %err, "could not load agent instruction file");
                return String::new();
            }
        }
    }

    tracing::warn!(file = %file.display(), "agent instruction file not found");
    String::new()
}

/// Drops content between the first two `---` fences, keeping the body.
/// A lone fence is ordinary markdown and passes through untouched.
pub fn strip_frontmatter(content: &str) -> String {
    let mut parts = content.splitn(3, "---");
    let _lead = parts.next();
    match (parts.next(), parts.next()) {
        (Some(_frontmatter), Some(body)) => body.trim().to_string(),
        _ => content.trim().to_string(),
    }
}
