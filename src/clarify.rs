use std::future::Future;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::RuntimeConfig;
use crate::prompt_engineer::{generate_clarification_questions, has_enough_info};

/// Appends the accumulated Q&A to the original prompt.
pub fn build_refined_prompt(initial_prompt: &str, answers: &[(String, String)]) -> String {
    if answers.is_empty() {
        return initial_prompt.to_string();
    }
    let mut refined = format!("{initial_prompt}\n\n### Clarifications:\n");
    for (question, answer) in answers {
        refined.push_str(&format!("- {question}: {answer}\n"));
    }
    refined
}

/// Reads one trimmed line from stdin, giving up when `interrupt` resolves
/// first. EOF and interruption both mean the user is done answering.
pub(crate) async fn read_line_or_interrupt<F>(
    prompt: &str,
    interrupt: F,
) -> Result<Option<String>>
where
    F: Future<Output = ()>,
{
    print!("{prompt}");
    std::io::stdout()
        .flush()
        .context("failed to flush stdout")?;

    // Detached thread, not the blocking pool: an abandoned read must not
    // hold up runtime shutdown.
    let (sender, receiver) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let result = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map(|read| (read, line));
        let _ = sender.send(result);
    });

    tokio::select! {
        biased;
        _ = interrupt => {
            println!();
            Ok(None)
        }
        received = receiver => {
            let (read, line) = received
                .context("stdin reader thread stopped")?
                .context("failed to read clarification response")?;
            if read == 0 {
                Ok(None)
            } else {
                Ok(Some(line.trim().to_string()))
            }
        }
    }
}

/// Ctrl-C during a prompt proceeds with the answers gathered so far.
async fn read_response(prompt: &str) -> Result<Option<String>> {
    read_line_or_interrupt(prompt, async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Phase 0.5: loops with the prompt engineer asking clarifying questions
/// until it has enough information or the user types `build`.
///
/// CLI only; MCP hosts drive clarification through their own tools.
pub async fn interactive_clarification(
    cfg: &RuntimeConfig,
    initial_prompt: &str,
    workspace_dir: Option<&Path>,
) -> Result<String> {
    println!("Phase 0.5: Interactive Clarification");
    println!("The prompt engineer will ask clarifying questions to refine your prompt.");
    println!("Answer each question, or type 'build' when ready to proceed.\n");

    let mut answers: Vec<(String, String)> = Vec::new();
    let mut current_prompt = initial_prompt.to_string();
    let mut round_number = 0usize;

    loop {
        round_number += 1;

        let (questions, analysis) =
            generate_clarification_questions(cfg, &current_prompt, &answers, workspace_dir).await;

        if questions.is_empty() {
            if answers.is_empty() {
                println!("No clarification needed. Prompt is clear and complete.\n");
                break;
            }
            if has_enough_info(cfg, &current_prompt, &answers, workspace_dir).await {
                println!("Prompt engineer has enough information to proceed.\n");
                break;
            }
            println!("No more questions, but information may still be incomplete.");
            println!("Type 'build' to proceed anyway, or provide additional context.\n");
            let Some(input) = read_response("Your response (or 'build' to proceed): ").await? else {
                break;
            };
            if input.eq_ignore_ascii_case("build") || input.is_empty() {
                println!("Proceeding with current information...\n");
                break;
            }
            answers.push(("Additional context".to_string(), input));
            current_prompt = build_refined_prompt(initial_prompt, &answers);
            println!("Additional context recorded.\n");
            continue;
        }

        println!("\nRound {round_number} - Questions:");
        for (index, question) in questions.iter().enumerate() {
            println!("{}. {question}", index + 1);
        }
        if !analysis.is_empty() {
            println!("\nAnalysis: {analysis}");
        }
        println!("(Type 'build' when ready to proceed, or provide your answers)\n");

        let Some(input) = read_response("Your response: ").await? else {
            break;
        };
        if input.eq_ignore_ascii_case("build") {
            println!("\nProceeding with current information...\n");
            break;
        }
        if input.is_empty() {
            println!("Empty input. Please provide an answer or type 'build' to proceed.\n");
            continue;
        }

        // One free-form response may cover several questions; record it
        // against each so later rounds see the full context.
        for question in &questions {
            answers.push((question.clone(), input.clone()));
        }
        current_prompt = build_refined_prompt(initial_prompt, &answers);
        println!(
            "Answer recorded. ({} question(s) answered, {} total clarification(s))\n",
            questions.len(),
            answers.len()
        );
    }

    Ok(build_refined_prompt(initial_prompt, &answers))
}
