use std::path::Path;

use crate::agents::{prompt_engineer_agent, role_instructions};
use crate::cli::Category;
use crate::config::RuntimeConfig;
use crate::parse::{extract_category, extract_section, parse_questions};
use crate::runner::{AgentInvocation, run_agent};

fn categorization_prompt(initial_prompt: &str) -> String {
    format!(
        "You are a prompt engineer. Your task is to:\n\
         \n\
         1. Perfect and optimize this user prompt: \"{initial_prompt}\"\n\
         \n\
         2. Categorize the perfected prompt into ONE of these categories:\n\
         \x20  - frontend: UI components, React, styling, accessibility, client-side logic\n\
         \x20  - backend: APIs, databases, server logic, microservices, data processing\n\
         \x20  - cloud: Infrastructure, AWS, Kubernetes, Terraform, deployment, scaling\n\
         \x20  - full-stack: Requires both frontend and backend work\n\
         \x20  - other: Code review, Python optimization, documentation, etc.\n\
         \n\
         3. Output your response in this EXACT format:\n\
         \n\
         ### Perfected Prompt\n\
         [Your perfected prompt here]\n\
         \n\
         ### Task Categorization\n\
         Category: [frontend|backend|cloud|full-stack|other]\n\
         Reason: [Brief explanation]\n\
         \n\
         ### Implementation Notes\n\
         [Your notes here]"
    )
}

/// Phase 1: refines the prompt and categorizes it into a specialist domain.
///
/// Falls back to the original prompt and `other` when the response does not
/// follow the section contract.
pub async fn perfect_prompt(
    cfg: &RuntimeConfig,
    initial_prompt: &str,
    workspace_dir: Option<&Path>,
) -> (String, Category) {
    tracing::info!("phase 1: perfecting prompt with prompt engineer agent");

    let engineer = prompt_engineer_agent();
    let instructions = role_instructions(cfg, &engineer, workspace_dir);
    let prompt = categorization_prompt(initial_prompt);

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

    let perfected = extract_section(&output, "Perfected Prompt")
        .unwrap_or_else(|| initial_prompt.to_string());
    let category = extract_category(&output)
        .map(|token| Category::parse_lenient(&token))
        .unwrap_or(Category::Other);

    tracing::info!(category = category.label(), "prompt engineering complete");
    (perfected, category)
}

fn accumulated_answers_section(accumulated_answers: &[(String, String)]) -> String {
    if accumulated_answers.is_empty() {
        return String::new();
    }
    let mut section = String::from("\n\n### Previous Clarifications:\n");
    for (question, answer) in accumulated_answers {
        section.push_str(&format!("Q: {question}\nA: {answer}\n"));
    }
    section
}

fn clarification_prompt(initial_prompt: &str, context_section: &str) -> String {
    format!(
        "You are a prompt engineer. Analyze this user prompt and determine what clarifying questions are needed to create the best possible prompt.\n\
         \n\
         Original Prompt: \"{initial_prompt}\"\n\
         {context_section}\n\
         \n\
         Your task:\n\
         1. Identify any ambiguities, missing details, or areas that need clarification\n\
         2. Generate specific, actionable questions that will help refine the prompt\n\
         3. If the prompt is already clear and complete, return an empty list\n\
         \n\
         Output your response in this EXACT format:\n\
         \n\
         ### Questions Needed\n\
         [List each question on a new line, numbered 1., 2., 3., etc. If no questions needed, write \"None\"]\n\
         \n\
         ### Analysis\n\
         [Brief explanation of why these questions are needed, or why none are needed]"
    )
}

/// Asks the prompt engineer which clarifying questions remain open.
/// An empty list means the prompt needs no further clarification.
pub async fn generate_clarification_questions(
    cfg: &RuntimeConfig,
    initial_prompt: &str,
    accumulated_answers: &[(String, String)],
    workspace_dir: Option<&Path>,
) -> (Vec<String>, String) {
    let engineer = prompt_engineer_agent();
    let instructions = role_instructions(cfg, &engineer, workspace_dir);
    let context_section = accumulated_answers_section(accumulated_answers);
    let prompt = clarification_prompt(initial_prompt, &context_section);

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

    let questions = parse_questions(&output);
    let analysis = extract_section(&output, "Analysis").unwrap_or_default();
    (questions, analysis)
}

fn completeness_prompt(initial_prompt: &str, context_section: &str) -> String {
    format!(
        "You are a prompt engineer. Evaluate if enough information has been gathered to create a comprehensive, actionable prompt.\n\
         \n\
         Original Prompt: \"{initial_prompt}\"\n\
         {context_section}\n\
         \n\
         Your task:\n\
         1. Assess if the original prompt combined with the clarifications provides enough detail\n\
         2. Determine if the information is sufficient to proceed with prompt engineering\n\
         3. Consider: Are there still critical ambiguities? Is the scope clear? Are technical requirements specified?\n\
         \n\
         Output your response in this EXACT format:\n\
         \n\
         ### Enough Information?\n\
         [Yes or No]\n\
         \n\
         ### Reasoning\n\
         [Brief explanation of your assessment]"
    )
}

/// Judges whether accumulated clarifications are sufficient to proceed.
/// Absent or malformed output means "not yet".
pub async fn has_enough_info(
    cfg: &RuntimeConfig,
    initial_prompt: &str,
    accumulated_answers: &[(String, String)],
    workspace_dir: Option<&Path>,
) -> bool {
    let engineer = prompt_engineer_agent();
    let instructions = role_instructions(cfg, &engineer, workspace_dir);

    let mut context_section = String::from("\n\n### Clarifications Received:\n");
    for (question, answer) in accumulated_answers {
        context_section.push_str(&format!("Q: {question}\nA: {answer}\n"));
    }
    let prompt = completeness_prompt(initial_prompt, &context_section);

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

    extract_section(&output, "Enough Information?")
        .map(|section| section.to_ascii_lowercase().contains("yes"))
        .unwrap_or(false)
}
