use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agents::{AgentCatalog, role_instructions, splitter_agent};
use crate::config::RuntimeConfig;
use crate::parse::extract_json_object;
use crate::runner::{AgentInvocation, run_agent};

/// One step in the splitter's execution plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub focus: String,
    #[serde(default)]
    pub reason: String,
}

/// Splitter analysis: which specialists a task needs and in what order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterResult {
    pub requires_multiple_agents: bool,
    pub agents_needed: Vec<String>,
    pub execution_strategy: String,
    pub execution_order: Vec<ExecutionStep>,
    pub dependencies: HashMap<String, Vec<String>>,
    pub summary: String,
}

impl Default for SplitterResult {
    fn default() -> SplitterResult {
        SplitterResult {
            requires_multiple_agents: false,
            agents_needed: Vec::new(),
            execution_strategy: "sequential".to_string(),
            execution_order: Vec::new(),
            dependencies: HashMap::new(),
            summary: String::new(),
        }
    }
}

impl SplitterResult {
    /// Single-agent fallback used whenever the splitter's JSON cannot be
    /// recovered from its output.
    pub fn fallback(summary: &str) -> SplitterResult {
        SplitterResult {
            summary: summary.to_string(),
            ..SplitterResult::default()
        }
    }

    pub fn from_output(output: &str) -> Option<SplitterResult> {
        let value = extract_json_object(output)?;
        serde_json::from_value::<SplitterResult>(value).ok()
    }
}

fn splitter_prompt(initial_prompt: &str, available_agents: &str) -> String {
    format!(
        "Analyze this user prompt and determine which specialized agents are needed:\n\
         \n\
         \"{initial_prompt}\"\n\
         \n\
         AVAILABLE AGENTS (you MUST use these exact names):\n\
         {available_agents}\n\
         \n\
         Output your analysis in the required JSON format with:\n\
         - requires_multiple_agents (true/false)\n\
         - agents_needed (list of agent names - MUST be from the available agents above)\n\
         - execution_strategy (\"sequential\" or \"parallel\")\n\
         - execution_order (list with \"agent\" field using EXACT agent names from above, plus \"focus\" describing what that agent should do)\n\
         - dependencies (if any)\n\
         - summary (brief explanation)\n\
         \n\
         IMPORTANT: Only use agent names from the AVAILABLE AGENTS list above. Do not invent new agent names.\n\
         \n\
         Make sure to output ONLY valid JSON, no markdown formatting."
    )
}

/// Phase 0: asks the splitter role which specialists the task needs.
pub async fn split_task(
    cfg: &RuntimeConfig,
    catalog: &AgentCatalog,
    initial_prompt: &str,
    workspace_dir: Option<&Path>,
) -> SplitterResult {
    tracing::info!("phase 0: analyzing task with splitter agent");

    let splitter = splitter_agent();
    let instructions = role_instructions(cfg, &splitter, workspace_dir);

    let available_agents = catalog.all_names().join(", ");
    let prompt = splitter_prompt(initial_prompt, &available_agents);

    let output = run_agent(&AgentInvocation {
        prompt: &prompt,
        instructions: Some(&instructions),
        model: &cfg.model,
        output_format: "text",
        workspace_dir,
        timeout_secs: cfg.agent_timeout_secs,
        api_key: cfg.api_key.as_deref(),
    })
    .await;

    match SplitterResult::from_output(&output) {
        Some(result) => {
            tracing::info!(
                agents = ?result.agents_needed,
                strategy = %result.execution_strategy,
                "splitter analysis complete"
            );
            result
        }
        None => {
            tracing::warn!("could not parse splitter JSON, defaulting to single agent workflow");
            SplitterResult::fallback("Could not parse splitter output, using default")
        }
    }
}
