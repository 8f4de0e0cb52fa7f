use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use serde::Deserialize;

use crate::agents::AgentCatalog;
use crate::cli::Category;
use crate::config::RuntimeConfig;
use crate::doctor::run_diagnostics;
use crate::executor::{compose_integration, execute_agent};
use crate::output::OutputBuilder;
use crate::pipeline::{PipelineOptions, render_pipeline_report, run_pipeline};
use crate::prompt_engineer::{generate_clarification_questions, has_enough_info, perfect_prompt};
use crate::splitter::{SplitterResult, split_task};
use crate::workspace::resolve_workspace;

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct AgentSquaredRequest {
    /// What you want to build or accomplish. Omit to see usage help.
    pub task: Option<String>,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct SplitTaskRequest {
    /// The task to analyze.
    pub prompt: String,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct PerfectPromptRequest {
    /// The prompt to optimize.
    pub prompt: String,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct RunSpecialistRequest {
    /// The specialist agent to run.
    pub agent: String,
    /// The optimized prompt.
    pub prompt: String,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct ComposeAgentsRequest {
    /// Names of the agents that were executed.
    pub agents_used: Vec<String>,
    /// The original task prompt.
    pub prompt: String,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct AgentChainRequest {
    /// The task to process.
    pub prompt: String,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
    #[serde(default)]
    pub skip_splitter: bool,
    #[serde(default)]
    pub skip_prompt_engineering: bool,
    /// frontend, backend, cloud, full-stack, other, or auto.
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct ClarifyingQuestionsRequest {
    /// The initial task prompt.
    pub prompt: String,
    /// Answers already collected, keyed by question.
    pub previous_answers: Option<HashMap<String, String>>,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
pub struct TaskReadinessRequest {
    /// The original task prompt.
    pub prompt: String,
    /// Answers gathered so far, keyed by question.
    pub answers: HashMap<String, String>,
    /// Path to the project workspace.
    pub workspace_dir: Option<String>,
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

fn error_result(message: String) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message)])
}

fn ordered_answers(answers: Option<&HashMap<String, String>>) -> Vec<(String, String)> {
    let mut pairs = answers
        .map(|map| {
            map.iter()
                .map(|(question, answer)| (question.clone(), answer.clone()))
                .collect::<Vec<(String, String)>>()
        })
        .unwrap_or_default();
    pairs.sort();
    pairs
}

/// MCP stdio server exposing the agent pipeline to a host chat client.
#[derive(Clone)]
pub struct AgentSquaredServer {
    cfg: Arc<RuntimeConfig>,
    tool_router: ToolRouter<AgentSquaredServer>,
}

#[tool_router]
impl AgentSquaredServer {
    pub fn new(cfg: RuntimeConfig) -> AgentSquaredServer {
        AgentSquaredServer {
            cfg: Arc::new(cfg),
            tool_router: Self::tool_router(),
        }
    }

    fn catalog(&self) -> AgentCatalog {
        AgentCatalog::load(&self.cfg)
    }

    fn workspace(&self, requested: Option<&str>) -> Result<PathBuf, CallToolResult> {
        resolve_workspace(requested.or(self.cfg.workspace.as_deref()))
            .map_err(|err| error_result(format!("**Error**: {err:#}")))
    }

    /// Bounds one pipeline step so a stuck agent CLI cannot hang the host
    /// chat session indefinitely.
    async fn with_step_timeout<F, T>(&self, what: &str, step: F) -> Result<T, CallToolResult>
    where
        F: Future<Output = T>,
    {
        let timeout_secs = self.cfg.mcp_step_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(timeout_secs), step).await {
            Ok(value) => Ok(value),
            Err(_) => Err(text_result(format!(
                "**Timeout**: {what} took longer than {timeout_secs} seconds. \
                 The agent CLI may be waiting for authentication or input."
            ))),
        }
    }

    fn render_split_result(result: &SplitterResult) -> String {
        let mut output = OutputBuilder::new();
        output.header("Step 1 Complete: Task Analysis");
        output.blank();
        output.field(
            "Requires multiple agents",
            &result.requires_multiple_agents.to_string(),
        );
        output.field("Agents needed", &result.agents_needed.join(", "));
        output.field("Execution strategy", &result.execution_strategy);
        output.field(
            "Summary",
            if result.summary.is_empty() {
                "N/A"
            } else {
                result.summary.as_str()
            },
        );
        output.blank();
        output.separator();
        output.add("**Next step**: Call `perfect_prompt` with the same prompt.");
        output.build()
    }

    #[tool(
        description = "Agent squared - multi-agent development orchestrator. USE THIS TOOL when the user says 'use agent_squared to ...' or wants to run complex development tasks. Chains splitter, prompt engineer, specialist agents, and composer. Pass the task and workspace_dir; call without a task to see usage help."
    )]
    async fn agent_squared(
        &self,
        Parameters(request): Parameters<AgentSquaredRequest>,
    ) -> Result<CallToolResult, McpError> {
        let catalog = self.catalog();

        let Some(task) = request.task.filter(|task| !task.trim().is_empty()) else {
            let mut output = OutputBuilder::new();
            output.header_level("Agent\u{b2} - Multi-Agent Development Orchestrator", 1);
            output.blank();
            output.add("Agent\u{b2} chains specialized AI agents together for complex development tasks.");
            output.blank();
            output.header("How to Use");
            output.add("Just say: **\"Use agent_squared to [describe your task]\"**");
            output.blank();
            output.add("Examples:");
            output.bullet("\"Use agent_squared to build a REST API with authentication\"");
            output.bullet("\"Use agent_squared to create a React dashboard with charts\"");
            output.bullet("\"Use agent_squared to set up a CI/CD pipeline for AWS\"");
            output.blank();
            output.header("How It Works");
            output.code(
                "Your Task -> Splitter -> Prompt Engineer -> Specialist Agent(s) -> Composer",
                "",
            );
            output.blank();
            output.header("Available Specialists");
            let specialists = catalog
                .specialist_names()
                .iter()
                .map(|name| format!("`{name}`"))
                .collect::<Vec<String>>()
                .join(", ");
            output.add(specialists);
            output.blank();
            output.separator();
            output.add("**Ready to start?** Just describe your task above!");
            return Ok(text_result(output.build()));
        };

        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };

        let split = match self
            .with_step_timeout(
                "Task splitting",
                split_task(&self.cfg, &catalog, &task, Some(&workspace_dir)),
            )
            .await
        {
            Ok(split) => split,
            Err(result) => return Ok(result),
        };

        let mut output = OutputBuilder::new();
        output.header_level("Agent\u{b2} Pipeline Started", 1);
        output.blank();
        output.field("Task", &task);
        output.blank();
        output.add(Self::render_split_result(&split));
        output.blank();
        output.separator();
        output.header("Recommended Next Steps");
        output.numbered(1, "Call `perfect_prompt` to optimize the task description");
        output.numbered(2, "Call `run_specialist` for each agent identified above");
        output.numbered(
            3,
            "If multiple agents were used, call `compose_agents` to validate integration",
        );
        output.blank();
        output.add("**Tip:** The agents identified above should match your available specialists:");
        output.add(format!("`{}`", catalog.specialist_names().join(", ")));

        Ok(text_result(output.build()))
    }

    #[tool(
        description = "STEP 1 of the pipeline: analyze a task and determine which specialist agents are needed. Recommended workflow: split_task, then perfect_prompt, then run_specialist for each agent, then compose_agents when more than one agent ran. Always pass workspace_dir when the user tags a project folder."
    )]
    async fn split_task(
        &self,
        Parameters(request): Parameters<SplitTaskRequest>,
    ) -> Result<CallToolResult, McpError> {
        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };
        let catalog = self.catalog();

        let split = match self
            .with_step_timeout(
                "Task splitting",
                split_task(&self.cfg, &catalog, &request.prompt, Some(&workspace_dir)),
            )
            .await
        {
            Ok(split) => split,
            Err(result) => return Ok(result),
        };

        Ok(text_result(Self::render_split_result(&split)))
    }

    #[tool(
        description = "STEP 2 of the pipeline: optimize and improve a prompt using prompt engineering. Call this after split_task to refine the prompt before running specialist agents."
    )]
    async fn perfect_prompt(
        &self,
        Parameters(request): Parameters<PerfectPromptRequest>,
    ) -> Result<CallToolResult, McpError> {
        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };

        let (perfected, category) = match self
            .with_step_timeout(
                "Prompt engineering",
                perfect_prompt(&self.cfg, &request.prompt, Some(&workspace_dir)),
            )
            .await
        {
            Ok(result) => result,
            Err(result) => return Ok(result),
        };

        let mut output = OutputBuilder::new();
        output.header("Step 2 Complete: Prompt Optimization");
        output.blank();
        output.field("Category detected", category.label());
        output.blank();
        output.add("**Optimized prompt**:");
        output.add(perfected);
        output.blank();
        output.separator();
        output.add(format!(
            "**Next step**: Call `run_specialist` with agent='{}'",
            category.label()
        ));

        Ok(text_result(output.build()))
    }

    #[tool(
        description = "STEP 3 of the pipeline: run a specific specialist agent to implement code changes. Call this separately for each agent identified by split_task."
    )]
    async fn run_specialist(
        &self,
        Parameters(request): Parameters<RunSpecialistRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.agent.trim().is_empty() {
            return Ok(error_result("**Error**: Agent name is required.".to_string()));
        }
        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };
        let catalog = self.catalog();

        let mut output = OutputBuilder::new();
        output.header(&format!("Running Specialist Agent: {}", request.agent));
        output.field("Workspace", &format!("`{}`", workspace_dir.display()));
        output.blank();

        let records = match execute_agent(
            &self.cfg,
            &catalog,
            &request.agent,
            &request.prompt,
            "",
            false,
            Some(&workspace_dir),
        )
        .await
        {
            Ok(records) => records,
            Err(err) => return Ok(error_result(format!("**Error**: {err:#}"))),
        };

        for record in &records {
            output.add(record.output.clone());
        }
        output.blank();
        output.separator();
        output.add(format!(
            "**Agent `{}` complete.** Changes saved to disk.",
            request.agent
        ));

        Ok(text_result(output.build()))
    }

    #[tool(
        description = "STEP 4 of the pipeline: validate integration between multiple specialist agents. Only needed when split_task identified more than one agent."
    )]
    async fn compose_agents(
        &self,
        Parameters(request): Parameters<ComposeAgentsRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.agents_used.len() < 2 {
            return Ok(text_result(
                "**Skipping**: Only needed for multiple agents.".to_string(),
            ));
        }
        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };

        let mut output = OutputBuilder::new();
        output.header("Running Integration Validation (Composer)");
        output.field("Agents", &request.agents_used.join(", "));
        output.blank();

        let composed = match compose_integration(
            &self.cfg,
            &request.agents_used,
            &request.prompt,
            false,
            Some(&workspace_dir),
        )
        .await
        {
            Ok(composed) => composed,
            Err(err) => return Ok(error_result(format!("**Error**: {err:#}"))),
        };

        output.add(composed);
        output.blank();
        output.separator();
        output.header("PIPELINE COMPLETE");
        output.add("All agents have run and integration validated.");
        output.add("**NO FURTHER IMPLEMENTATION NEEDED**");

        Ok(text_result(output.build()))
    }

    #[tool(
        description = "[ALTERNATIVE] Run the entire pipeline in one call. For better visibility prefer the step-by-step approach; this runs everything internally without intermediate visibility."
    )]
    async fn agent_chain(
        &self,
        Parameters(request): Parameters<AgentChainRequest>,
    ) -> Result<CallToolResult, McpError> {
        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };
        let catalog = self.catalog();

        let forced_category = request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty() && !category.eq_ignore_ascii_case("auto"))
            .map(Category::parse_lenient);

        let options = PipelineOptions {
            interactive: false,
            skip_splitter: request.skip_splitter,
            skip_prompt_engineering: request.skip_prompt_engineering,
            forced_category,
            create_plans: false,
        };

        let result = match run_pipeline(
            &self.cfg,
            &catalog,
            &request.prompt,
            options,
            &workspace_dir,
        )
        .await
        {
            Ok(result) => result,
            Err(err) => return Ok(error_result(format!("**Error**: {err:#}"))),
        };

        Ok(text_result(render_pipeline_report(
            &self.cfg,
            &result,
            &workspace_dir,
        )))
    }

    #[tool(description = "List all available specialist agents and their capabilities.")]
    async fn list_agents(&self) -> Result<CallToolResult, McpError> {
        let catalog = self.catalog();

        let mut output = OutputBuilder::new();
        output.header("Core Agents");
        output.blank();
        for agent in catalog.core.iter().filter(|agent| !agent.is_composite()) {
            output.bullet(format!("**{}** ({})", agent.key, agent.display_name));
        }
        output.blank();
        output.header("Additional Agents");
        output.blank();
        for agent in &catalog.additional {
            output.bullet(format!("**{}** ({})", agent.key, agent.display_name));
        }
        if !catalog.custom.is_empty() {
            output.blank();
            output.header("Custom Agents");
            output.blank();
            for agent in &catalog.custom {
                output.bullet(format!("**{}** (custom)", agent.key));
            }
        }

        output.blank();
        output.separator();
        output.header_level("Adding Custom Agents", 3);
        match self.cfg.custom_agents_dir.as_deref() {
            Some(dir) => {
                output.add(format!("Add `.md` files to: `{}`", dir.display()));
                output.add(
                    "Any `.md` file not already mapped to a built-in agent will be auto-discovered.",
                );
            }
            None => {
                output.add(
                    "Create `~/.agent-squared/agents/` and drop `.md` files there to add custom agents.",
                );
            }
        }

        Ok(text_result(output.build()))
    }

    #[tool(
        description = "Analyze a task and generate clarifying questions before execution. Use this before starting the pipeline when you want to gather more information."
    )]
    async fn get_clarifying_questions(
        &self,
        Parameters(request): Parameters<ClarifyingQuestionsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };
        let answers = ordered_answers(request.previous_answers.as_ref());

        let (questions, analysis) = match self
            .with_step_timeout(
                "Clarification analysis",
                generate_clarification_questions(
                    &self.cfg,
                    &request.prompt,
                    &answers,
                    Some(&workspace_dir),
                ),
            )
            .await
        {
            Ok(result) => result,
            Err(result) => return Ok(result),
        };

        let mut output = OutputBuilder::new();
        output.header("Clarifying Questions");
        output.blank();
        if questions.is_empty() {
            output.add("No clarification needed. The prompt is clear and complete.");
        } else {
            for (index, question) in questions.iter().enumerate() {
                output.numbered(index + 1, question);
            }
        }
        if !analysis.is_empty() {
            output.blank();
            output.field("Analysis", &analysis);
        }
        output.blank();
        output.separator();
        output.add(
            "**Next step**: Gather answers, then call `check_task_readiness` or start the pipeline.",
        );

        Ok(text_result(output.build()))
    }

    #[tool(
        description = "Check if enough information has been gathered to proceed with a task. Use after gathering answers to clarifying questions."
    )]
    async fn check_task_readiness(
        &self,
        Parameters(request): Parameters<TaskReadinessRequest>,
    ) -> Result<CallToolResult, McpError> {
        let workspace_dir = match self.workspace(request.workspace_dir.as_deref()) {
            Ok(workspace_dir) => workspace_dir,
            Err(result) => return Ok(result),
        };
        let answers = ordered_answers(Some(&request.answers));

        let ready = match self
            .with_step_timeout(
                "Readiness check",
                has_enough_info(&self.cfg, &request.prompt, &answers, Some(&workspace_dir)),
            )
            .await
        {
            Ok(ready) => ready,
            Err(result) => return Ok(result),
        };

        let mut output = OutputBuilder::new();
        output.header("Task Readiness");
        output.blank();
        output.field("Ready to proceed", if ready { "yes" } else { "no" });
        output.blank();
        if ready {
            output.add("**Next step**: Call `agent_squared` or `split_task` to start the pipeline.");
        } else {
            output.add(
                "**Next step**: Call `get_clarifying_questions` again with the answers collected so far.",
            );
        }

        Ok(text_result(output.build()))
    }

    #[tool(
        description = "Test if the external agent CLI is installed, authenticated, and responding. Use this to diagnose issues when other tools are timing out or failing."
    )]
    async fn test_agent_cli(&self) -> Result<CallToolResult, McpError> {
        Ok(text_result(run_diagnostics(&self.cfg).await))
    }
}

#[tool_handler]
impl ServerHandler for AgentSquaredServer {
    fn get_info(&self) -> ServerInfo {
        // ServerInfo and Implementation are non_exhaustive upstream.
        let mut server_info = Implementation::default();
        server_info.name = "agent-squared".to_string();
        server_info.version = env!("CARGO_PKG_VERSION").to_string();

        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = server_info;
        info.instructions = Some(
            "Agent squared orchestrates specialist AI agents over the external agent CLI. \
             Start with `agent_squared` for a guided flow, or drive the pipeline step by \
             step with `split_task`, `perfect_prompt`, `run_specialist`, and \
             `compose_agents`."
                .to_string(),
        );
        info
    }
}

/// Runs the MCP server over stdio until the host disconnects.
///
/// Stdout belongs to JSON-RPC here; all logging must already be routed to
/// stderr before this is called.
pub async fn run_mcp_server(cfg: RuntimeConfig) -> Result<()> {
    tracing::info!(model = %cfg.model, "starting MCP stdio server");
    let service = AgentSquaredServer::new(cfg)
        .serve(stdio())
        .await
        .context("failed to start MCP stdio server")?;
    service
        .waiting()
        .await
        .context("MCP server terminated abnormally")?;
    Ok(())
}
