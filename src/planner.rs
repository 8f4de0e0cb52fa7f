use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::agents::{prompt_engineer_agent, role_instructions};
use crate::config::RuntimeConfig;
use crate::runner::{AgentInvocation, run_agent};

fn plan_prompt(prompt: &str, agent_name: Option<&str>, focus: Option<&str>) -> String {
    match (agent_name, focus) {
        (Some(agent), Some(focus)) => format!(
            "You are a prompt engineer. Create a comprehensive plan document for this specific agent task:\n\
             \n\
             Task: \"{prompt}\"\n\
             \n\
             Agent: {agent}\n\
             Focus: {focus}\n\
             \n\
             The plan should include:\n\
             1. Architecture/Design overview specific to this agent's domain\n\
             2. Technology choices and rationale\n\
             3. Core components/modules to build\n\
             4. Step-by-step implementation approach\n\
             5. Dependencies and prerequisites\n\
             6. Testing strategy\n\
             7. Integration points with other components (if applicable)\n\
             \n\
             Format the plan as a structured markdown document with clear sections.\n\
             Be detailed and specific about what this agent needs to build."
        ),
        _ => format!(
            "You are a prompt engineer. Create a comprehensive plan document for this task:\n\
             \n\
             \"{prompt}\"\n\
             \n\
             The plan should include:\n\
             1. Architecture overview (if applicable)\n\
             2. Tech stack and technology choices\n\
             3. Core components/modules\n\
             4. Implementation steps in logical order\n\
             5. Dependencies and prerequisites\n\
             6. Testing strategy\n\
             7. Deployment considerations (if applicable)\n\
             \n\
             Format the plan as a structured markdown document with clear sections and subsections.\n\
             Be detailed and specific about what needs to be built."
        ),
    }
}

/// Picks the plans directory: `<workspace>/plans` when it already exists,
/// otherwise the configured (or default) `plans/` under the current tree.
pub fn plans_directory(cfg: &RuntimeConfig, workspace_dir: Option<&Path>) -> PathBuf {
    if let Some(workspace) = workspace_dir {
        let candidate = workspace.join("plans");
        if candidate.is_dir() {
            return candidate;
        }
    }
    PathBuf::from(cfg.plans_dir.as_deref().unwrap_or("plans"))
}

/// Slug used in plan filenames: alphanumerics, spaces, and hyphens only,
/// capped before spaces become hyphens.
pub fn plan_slug(source: &str, max_chars: usize, fallback: &str) -> String {
    let filtered = source
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || ch.is_ascii_whitespace() || *ch == '-')
        .take(max_chars)
        .collect::<String>();
    let slug = filtered
        .trim()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("-")
        .to_ascii_lowercase();
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

fn format_plan_content(
    prompt: &str,
    agent_name: Option<&str>,
    focus: Option<&str>,
    output: &str,
    plan_id: &str,
) -> String {
    let marker_a = uuid::Uuid::new_v4();
    let marker_b = uuid::Uuid::new_v4();
    let title = match agent_name {
        Some(agent) => format!("{agent}: {prompt}"),
        None => prompt.to_string(),
    };
    let focus_section = focus
        .map(|focus| format!("\n## Focus: {focus}"))
        .unwrap_or_default();
    let agent_footer = agent_name
        .map(|agent| format!("\n*Agent: {agent}*"))
        .unwrap_or_default();
    let created = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    format!(
        "<!-- {marker_a} {marker_b} -->\n\
         # {title}\n\
         {focus_section}\n\
         \n\
         {output}\n\
         \n\
         ---\n\
         *Plan created: {created}*\n\
         *Plan ID: {plan_id}*{agent_footer}\n"
    )
}

/// Creates a plan document for the prompt (optionally scoped to one agent)
/// via the prompt-engineer role. Returns the written path, or `None` when
/// the agent produced nothing to save.
pub async fn create_plan(
    cfg: &RuntimeConfig,
    prompt: &str,
    workspace_dir: Option<&Path>,
    agent_name: Option<&str>,
    focus: Option<&str>,
) -> Result<Option<PathBuf>> {
    match agent_name {
        Some(agent) => tracing::info!(agent, "creating plan document"),
        None => tracing::info!("creating plan document"),
    }

    let engineer = prompt_engineer_agent();
    let instructions = role_instructions(cfg, &engineer, workspace_dir);
    let request = plan_prompt(prompt, agent_name, focus);

    let output = run_agent(&AgentInvocation {
        prompt: &request,
        instructions: Some(&instructions),
        model: &cfg.model,
        output_format: "text",
        workspace_dir,
        timeout_secs: cfg.agent_timeout_secs,
        api_key: cfg.api_key.as_deref(),
    })
    .await;

    if output.trim().is_empty() {
        tracing::warn!("failed to generate plan content");
        return Ok(None);
    }

    let plans_dir = plans_directory(cfg, workspace_dir);
    std::fs::create_dir_all(&plans_dir).with_context(|| {
        format!("failed to create plans directory '{}'", plans_dir.display())
    })?;

    let slug = match agent_name {
        Some(agent) => plan_slug(agent, 30, "agent"),
        None => plan_slug(prompt, 50, "plan"),
    };
    let plan_id = uuid::Uuid::new_v4().simple().to_string();
    let short_id = &plan_id[..8];
    let plan_path = plans_dir.join(format!("{slug}-{short_id}.plan.md"));

    let content = format_plan_content(prompt, agent_name, focus, &output, short_id);
    std::fs::write(&plan_path, content)
        .with_context(|| format!("failed to save plan '{}'", plan_path.display()))?;

    tracing::info!(path = %plan_path.display(), "plan created");
    Ok(Some(plan_path))
}
