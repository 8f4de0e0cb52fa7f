use std::path::Path;

use anyhow::Result;

use crate::agents::AgentCatalog;
use crate::cli::Category;
use crate::config::RuntimeConfig;
use crate::executor::{
    ExecutionOptions, ExecutionRecord, compose_integration, execute_agent,
    execute_multiple_agents,
};
use crate::output::{OutputBuilder, truncate_output};
use crate::prompt_engineer::perfect_prompt;
use crate::splitter::split_task;
use crate::workspace::modified_files;

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub interactive: bool,
    pub skip_splitter: bool,
    pub skip_prompt_engineering: bool,
    /// Forces the specialist directly, bypassing the splitter and prompt
    /// engineering.
    pub forced_category: Option<Category>,
    pub create_plans: bool,
}

/// Everything a pipeline run produced, for rendering by the CLI or an MCP
/// client.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub agents_used: Vec<String>,
    pub agent_outputs: Vec<ExecutionRecord>,
    pub composer_output: Option<String>,
    pub detected_category: Category,
    pub perfected_prompt: String,
    pub modified_files: Vec<String>,
}

/// Runs the full chain: splitter, prompt engineering, specialists, composer.
///
/// Each phase degrades rather than aborts: a failed splitter falls back to
/// the single-agent path and a failed prompt engineer leaves the original
/// prompt in place.
pub async fn run_pipeline(
    cfg: &RuntimeConfig,
    catalog: &AgentCatalog,
    prompt: &str,
    options: PipelineOptions,
    workspace_dir: &Path,
) -> Result<PipelineResult> {
    tracing::info!(workspace = %workspace_dir.display(), "pipeline started");

    let mut perfected_prompt = prompt.to_string();
    let mut detected_category = options.forced_category.unwrap_or(Category::Other);

    // Skipping prompt engineering or forcing a category also silences the
    // splitter; the category alone decides the specialist then.
    let splitter_result = if !options.skip_splitter
        && !options.skip_prompt_engineering
        && options.forced_category.is_none()
    {
        Some(split_task(cfg, catalog, prompt, Some(workspace_dir)).await)
    } else {
        None
    };

    if !options.skip_prompt_engineering && options.forced_category.is_none() {
        let (refined, category) = perfect_prompt(cfg, prompt, Some(workspace_dir)).await;
        perfected_prompt = refined;
        detected_category = category;
    }

    let execution = ExecutionOptions {
        interactive: options.interactive,
        create_plans: options.create_plans,
    };

    let (agents_used, agent_outputs, composer_output) = match &splitter_result {
        Some(split) if split.requires_multiple_agents => {
            let agents_used = split
                .execution_order
                .iter()
                .map(|step| step.agent.clone())
                .collect::<Vec<String>>();
            let outcome = execute_multiple_agents(
                cfg,
                catalog,
                split,
                &perfected_prompt,
                execution,
                Some(workspace_dir),
            )
            .await?;
            (agents_used, outcome.records, outcome.composer_output)
        }
        _ => {
            let agent_name = detected_category.label();
            let records = execute_agent(
                cfg,
                catalog,
                agent_name,
                &perfected_prompt,
                "",
                options.interactive,
                Some(workspace_dir),
            )
            .await?;
            // A composite category (full-stack) already ran its members and
            // a composer pass; more than one specialist still warrants the
            // phase 3 validation here.
            let specialists = records
                .iter()
                .filter(|record| record.agent != "composer")
                .map(|record| record.agent.clone())
                .collect::<Vec<String>>();
            let composer_output = if specialists.len() > 1
                && !records.iter().any(|record| record.agent == "composer")
            {
                Some(
                    compose_integration(
                        cfg,
                        &specialists,
                        &perfected_prompt,
                        options.interactive,
                        Some(workspace_dir),
                    )
                    .await?,
                )
            } else {
                records
                    .iter()
                    .find(|record| record.agent == "composer")
                    .map(|record| record.output.clone())
            };
            let agent_outputs = records
                .into_iter()
                .filter(|record| record.agent != "composer")
                .collect::<Vec<ExecutionRecord>>();
            (specialists, agent_outputs, composer_output)
        }
    };

    let modified = modified_files(workspace_dir, cfg.git_timeout_secs).await;
    tracing::info!(
        agents = ?agents_used,
        modified_files = modified.len(),
        "pipeline execution finished"
    );

    Ok(PipelineResult {
        agents_used,
        agent_outputs,
        composer_output,
        detected_category,
        perfected_prompt,
        modified_files: modified,
    })
}

/// Renders the pipeline result as the markdown report handed back to the
/// caller. The framing matters: the agents have already written changes to
/// disk, and the report must stop an MCP host from re-implementing them.
pub fn render_pipeline_report(
    cfg: &RuntimeConfig,
    result: &PipelineResult,
    workspace_dir: &Path,
) -> String {
    let mut output = OutputBuilder::new();

    output.header_level("AGENT\u{b2} PIPELINE EXECUTION COMPLETE", 1);
    output.blank();
    output.add("**IMPORTANT: The cursor-agent CLI has already executed and made code changes.**");
    output.add("**DO NOT re-implement the changes - they are already saved to disk.**");
    output.blank();

    output.header("Execution Summary");
    output.bullet(format!("**Workspace**: `{}`", workspace_dir.display()));
    output.bullet(format!(
        "**Agents executed**: {}",
        result.agents_used.join(", ")
    ));
    output.bullet(format!(
        "**Category**: {}",
        result.detected_category.label()
    ));
    output.blank();

    if !result.modified_files.is_empty() {
        output.header("Files Modified");
        for file in result.modified_files.iter().take(cfg.max_modified_files_shown) {
            output.bullet(format!("`{file}`"));
        }
        if result.modified_files.len() > cfg.max_modified_files_shown {
            output.bullet(format!(
                "... and {} more",
                result.modified_files.len() - cfg.max_modified_files_shown
            ));
        }
        output.blank();
    }

    output.header("Agent Execution Details");
    for record in &result.agent_outputs {
        output.header_level(&record.agent, 3);
        if !record.focus.is_empty() {
            output.field("Focus", &record.focus);
        }
        output.add(truncate_output(&record.output, cfg.max_output_chars));
        output.blank();
    }

    if let Some(composer_output) = &result.composer_output {
        output.header_level("Composer (Integration Validation)", 3);
        output.add(truncate_output(composer_output, cfg.max_composer_output_chars));
        output.blank();
    }

    output.separator();
    output.header("WORK COMPLETED");
    output.add("The requested changes have been implemented and saved.");
    output.add("**NO FURTHER IMPLEMENTATION NEEDED**");

    output.build()
}
