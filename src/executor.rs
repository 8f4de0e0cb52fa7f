use std::path::Path;

use anyhow::Result;

use crate::agents::{AgentCatalog, AgentKind, AgentSpec, composer_agent, role_instructions};
use crate::cli::Category;
use crate::config::RuntimeConfig;
use crate::planner::create_plan;
use crate::runner::{AgentInvocation, run_agent, run_agent_interactive};
use crate::splitter::SplitterResult;

/// Output of one specialist run. Interactive runs leave `output` empty
/// because the terminal was handed to the agent UI.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub agent: String,
    pub focus: String,
    pub output: String,
}

/// All specialist records from an execution phase plus the composer's
/// integration report, when one ran.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub records: Vec<ExecutionRecord>,
    pub composer_output: Option<String>,
}

impl ExecutionOutcome {
    pub fn agents_used(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.agent.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionOptions {
    pub interactive: bool,
    pub create_plans: bool,
}

fn prompt_with_focus(prompt: &str, focus: &str) -> String {
    if focus.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\nFocus: {focus}")
    }
}

async fn run_role(
    cfg: &RuntimeConfig,
    instructions: &str,
    prompt: &str,
    interactive: bool,
    workspace_dir: Option<&Path>,
) -> Result<String> {
    let invocation = AgentInvocation {
        prompt,
        instructions: Some(instructions),
        model: &cfg.model,
        output_format: "text",
        workspace_dir,
        timeout_secs: cfg.agent_timeout_secs,
        api_key: cfg.api_key.as_deref(),
    };
    if interactive {
        run_agent_interactive(&invocation).await?;
        Ok(String::new())
    } else {
        Ok(run_agent(&invocation).await)
    }
}

/// Runs an agent with no role instructions. Used when a requested agent
/// name is not in the catalog.
async fn run_default_agent(
    cfg: &RuntimeConfig,
    prompt: &str,
    interactive: bool,
    workspace_dir: Option<&Path>,
) -> Result<String> {
    run_role(cfg, "", prompt, interactive, workspace_dir).await
}

async fn run_instruction_agent(
    cfg: &RuntimeConfig,
    spec: &AgentSpec,
    prompt: &str,
    focus: &str,
    interactive: bool,
    workspace_dir: Option<&Path>,
) -> Result<ExecutionRecord> {
    let instructions = role_instructions(cfg, spec, workspace_dir);
    if interactive {
        tracing::info!(agent = %spec.display_name, "opening agent interactively");
    } else {
        tracing::info!(agent = %spec.display_name, "running agent");
    }
    let output = run_role(cfg, &instructions, prompt, interactive, workspace_dir).await?;
    Ok(ExecutionRecord {
        agent: spec.key.clone(),
        focus: focus.to_string(),
        output,
    })
}

/// Executes one agent by name. Composite agents fan out to their members
/// and finish with an integration pass; unknown names degrade to the
/// default agent with a warning.
pub async fn execute_agent(
    cfg: &RuntimeConfig,
    catalog: &AgentCatalog,
    agent_name: &str,
    prompt: &str,
    focus: &str,
    interactive: bool,
    workspace_dir: Option<&Path>,
) -> Result<Vec<ExecutionRecord>> {
    let full_prompt = prompt_with_focus(prompt, focus);

    let Some(spec) = catalog.lookup(agent_name) else {
        tracing::warn!(agent = agent_name, "unknown agent, using default agent");
        let output = run_default_agent(cfg, &full_prompt, interactive, workspace_dir).await?;
        return Ok(vec![ExecutionRecord {
            agent: agent_name.to_string(),
            focus: focus.to_string(),
            output,
        }]);
    };

    match &spec.kind {
        AgentKind::Instruction { .. } => {
            let record =
                run_instruction_agent(cfg, spec, &full_prompt, focus, interactive, workspace_dir)
                    .await?;
            Ok(vec![record])
        }
        AgentKind::Composite { members } => {
            tracing::info!(agent = %spec.key, "running composite agent");
            let mut records = Vec::new();
            for member_name in members {
                match catalog.lookup(member_name) {
                    Some(member) if !member.is_composite() => {
                        let record = run_instruction_agent(
                            cfg,
                            member,
                            &full_prompt,
                            focus,
                            interactive,
                            workspace_dir,
                        )
                        .await?;
                        records.push(record);
                    }
                    _ => {
                        tracing::warn!(
                            agent = %member_name,
                            "composite member missing from catalog, using default agent"
                        );
                        let output =
                            run_default_agent(cfg, &full_prompt, interactive, workspace_dir)
                                .await?;
                        records.push(ExecutionRecord {
                            agent: member_name.clone(),
                            focus: focus.to_string(),
                            output,
                        });
                    }
                }
            }
            if members.len() > 1 {
                let composed =
                    compose_integration(cfg, members, prompt, interactive, workspace_dir).await?;
                records.push(ExecutionRecord {
                    agent: composer_agent().key,
                    focus: String::new(),
                    output: composed,
                });
            }
            Ok(records)
        }
    }
}

fn composer_prompt(agents_used: &[String], original_prompt: &str) -> String {
    let agents_list = agents_used
        .iter()
        .map(|agent| format!("- {agent}"))
        .collect::<Vec<String>>()
        .join("\n");
    format!(
        "You are the integration composer. Multiple specialist agents have just completed work on this task:\n\
         \n\
         **Original Task:** {original_prompt}\n\
         \n\
         **Agents that contributed:**\n\
         {agents_list}\n\
         \n\
         **Your job:**\n\
         1. Review the code/changes made by each agent\n\
         2. Verify that their outputs integrate correctly\n\
         3. Check API contracts, data flow, type consistency\n\
         4. Fix any integration issues you find\n\
         5. Add any missing glue code\n\
         \n\
         Start by examining recent changes (git diff or read modified files), then validate integration points between the components.\n\
         \n\
         Output a clear integration report showing what was validated and any fixes made."
    )
}

/// Phase 3: runs the composer role to verify that the specialists' work
/// integrates, fixing seams where it does not.
pub async fn compose_integration(
    cfg: &RuntimeConfig,
    agents_used: &[String],
    original_prompt: &str,
    interactive: bool,
    workspace_dir: Option<&Path>,
) -> Result<String> {
    tracing::info!(
        agents = %agents_used.join(", "),
        "phase 3: validating integration with composer agent"
    );

    let composer = composer_agent();
    let instructions = role_instructions(cfg, &composer, workspace_dir);
    let prompt = composer_prompt(agents_used, original_prompt);
    run_role(cfg, &instructions, &prompt, interactive, workspace_dir).await
}

/// Phase 2 (multi-agent): runs the splitter's execution order, optionally
/// writing a plan per step, and composes when more than one agent ran.
pub async fn execute_multiple_agents(
    cfg: &RuntimeConfig,
    catalog: &AgentCatalog,
    splitter_result: &SplitterResult,
    perfected_prompt: &str,
    options: ExecutionOptions,
    workspace_dir: Option<&Path>,
) -> Result<ExecutionOutcome> {
    let execution_order = &splitter_result.execution_order;
    tracing::info!(
        count = execution_order.len(),
        strategy = %splitter_result.execution_strategy,
        "phase 2: executing agents"
    );

    if execution_order.is_empty() {
        tracing::warn!("no execution order specified, using default single agent");
        return execute_with_specialist(
            cfg,
            catalog,
            perfected_prompt,
            Category::Other,
            options,
            workspace_dir,
        )
        .await;
    }

    let mut outcome = ExecutionOutcome::default();
    for (index, step) in execution_order.iter().enumerate() {
        tracing::info!(
            step = index + 1,
            total = execution_order.len(),
            agent = %step.agent,
            reason = %step.reason,
            focus = %step.focus,
            "executing step"
        );

        if options.create_plans {
            let plan_prompt = prompt_with_focus(perfected_prompt, &step.focus);
            let focus = (!step.focus.is_empty()).then_some(step.focus.as_str());
            if let Some(path) =
                create_plan(cfg, &plan_prompt, workspace_dir, Some(&step.agent), focus).await?
            {
                tracing::info!(agent = %step.agent, path = %path.display(), "plan saved");
            }
        }

        let agent_prompt = if step.focus.is_empty() {
            perfected_prompt.to_string()
        } else {
            format!("{perfected_prompt}\n\nSpecific focus for this agent: {}", step.focus)
        };

        let records = execute_agent(
            cfg,
            catalog,
            &step.agent,
            &agent_prompt,
            &step.focus,
            options.interactive,
            workspace_dir,
        )
        .await?;
        outcome.records.extend(records);
    }

    if execution_order.len() > 1 {
        let agents_used = execution_order
            .iter()
            .map(|step| step.agent.clone())
            .collect::<Vec<String>>();
        let composed = compose_integration(
            cfg,
            &agents_used,
            perfected_prompt,
            options.interactive,
            workspace_dir,
        )
        .await?;
        outcome.composer_output = Some(composed);
    }

    Ok(outcome)
}

fn full_stack_backend_prompt(prompt: &str) -> String {
    format!(
        "This is a full-stack task. Focus on the backend/API layer first.\n\
         \n\
         {prompt}\n\
         \n\
         Provide:\n\
         - API endpoint definitions\n\
         - Database schema\n\
         - Service architecture\n\
         - Backend implementation details\n"
    )
}

fn full_stack_frontend_prompt(prompt: &str) -> String {
    format!(
        "This is a full-stack task. Now focus on the frontend/UI layer.\n\
         \n\
         {prompt}\n\
         \n\
         Provide:\n\
         - React components\n\
         - Styling implementation\n\
         - State management\n\
         - Frontend integration with the backend API\n"
    )
}

async fn execute_full_stack(
    cfg: &RuntimeConfig,
    catalog: &AgentCatalog,
    prompt: &str,
    options: ExecutionOptions,
    workspace_dir: Option<&Path>,
) -> Result<ExecutionOutcome> {
    let mut outcome = ExecutionOutcome::default();

    tracing::info!("step 2a: backend architecture");
    let mut backend_records = execute_agent(
        cfg,
        catalog,
        "backend",
        &full_stack_backend_prompt(prompt),
        "",
        options.interactive,
        workspace_dir,
    )
    .await?;
    outcome.records.append(&mut backend_records);

    tracing::info!("step 2b: frontend implementation");
    let mut frontend_records = execute_agent(
        cfg,
        catalog,
        "frontend",
        &full_stack_frontend_prompt(prompt),
        "",
        options.interactive,
        workspace_dir,
    )
    .await?;
    outcome.records.append(&mut frontend_records);

    let agents_used = vec!["backend-architect".to_string(), "frontend-developer".to_string()];
    let composed = compose_integration(
        cfg,
        &agents_used,
        prompt,
        options.interactive,
        workspace_dir,
    )
    .await?;
    outcome.composer_output = Some(composed);

    Ok(outcome)
}

/// Phase 2 (single-agent path): dispatches to the specialist matching the
/// detected category. `full-stack` runs backend, then frontend, then the
/// composer.
pub async fn execute_with_specialist(
    cfg: &RuntimeConfig,
    catalog: &AgentCatalog,
    prompt: &str,
    category: Category,
    options: ExecutionOptions,
    workspace_dir: Option<&Path>,
) -> Result<ExecutionOutcome> {
    tracing::info!(category = category.label(), "phase 2: executing with specialist");

    if category == Category::FullStack {
        return execute_full_stack(cfg, catalog, prompt, options, workspace_dir).await;
    }

    match catalog.lookup(category.label()) {
        Some(spec) if !spec.is_composite() => {
            let record = run_instruction_agent(
                cfg,
                spec,
                prompt,
                "",
                options.interactive,
                workspace_dir,
            )
            .await?;
            Ok(ExecutionOutcome {
                records: vec![record],
                composer_output: None,
            })
        }
        _ => {
            tracing::warn!(
                category = category.label(),
                "no specialist for category, running with default agent"
            );
            let output =
                run_default_agent(cfg, prompt, options.interactive, workspace_dir).await?;
            Ok(ExecutionOutcome {
                records: vec![ExecutionRecord {
                    agent: category.label().to_string(),
                    focus: String::new(),
                    output,
                }],
                composer_output: None,
            })
        }
    }
}
