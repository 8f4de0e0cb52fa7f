use std::ffi::OsString;
use std::path::Path;
use std::sync::Mutex;

use rmcp::ServerHandler;
use tempfile::tempdir;

use crate::agents::*;
use crate::clarify::*;
use crate::cli::*;
use crate::config::*;
use crate::doctor::probe_version;
use crate::error::*;
use crate::executor::ExecutionRecord;
use crate::mcp::AgentSquaredServer;
use crate::output::*;
use crate::parse::*;
use crate::pipeline::{PipelineOptions, PipelineResult, render_pipeline_report, run_pipeline};
use crate::planner::{plan_slug, plans_directory};
use crate::runner::*;
use crate::splitter::*;
use crate::workspace::*;

// Tests that rewrite PATH/HOME serialize on this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn set_env_sandbox(bin_dir: &Path, home_dir: &Path) -> (Option<OsString>, Option<OsString>) {
    let saved_path = std::env::var_os("PATH");
    let saved_home = std::env::var_os("HOME");
    unsafe {
        std::env::set_var("PATH", bin_dir);
        std::env::set_var("HOME", home_dir);
    }
    (saved_path, saved_home)
}

fn restore_env_sandbox(saved: (Option<OsString>, Option<OsString>)) {
    unsafe {
        match saved.0 {
            Some(value) => std::env::set_var("PATH", value),
            None => std::env::remove_var("PATH"),
        }
        match saved.1 {
            Some(value) => std::env::set_var("HOME", value),
            None => std::env::remove_var("HOME"),
        }
    }
}

/// Writes an executable stand-in for the agent CLI into `<dir>/bin` that
/// appends to a call log. Returns the log path.
fn install_fake_agent(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bin_dir = dir.join("bin");
    std::fs::create_dir_all(&bin_dir).expect("fixture dir should create");
    let log_path = dir.join("agent-calls.log");
    let script = format!(
        "#!/bin/sh\necho call >> \"{}\"\necho \"done\"\n",
        log_path.display()
    );
    let script_path = bin_dir.join("cursor-agent");
    std::fs::write(&script_path, script).expect("fixture script should write");
    std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
        .expect("fixture script should be marked executable");
    log_path
}

fn agent_call_count(log_path: &Path) -> usize {
    std::fs::read_to_string(log_path)
        .unwrap_or_default()
        .lines()
        .count()
}

fn base_cfg() -> RuntimeConfig {
    RuntimeConfig {
        profile: "default".to_string(),
        config_path: ".agent-squared/config.toml".to_string(),
        model: "composer-1".to_string(),
        workspace: None,
        agent_timeout_secs: 600,
        mcp_step_timeout_secs: 90,
        max_output_chars: 2000,
        max_composer_output_chars: 1500,
        max_modified_files_shown: 20,
        git_timeout_secs: 10,
        instructions_dir: "agents".to_string(),
        plans_dir: None,
        custom_agents_dir: None,
        api_key: None,
        show_sensitive_config: false,
    }
}

fn test_cli(config_path: &str, profile: &str) -> Cli {
    Cli {
        model: None,
        profile: profile.to_string(),
        config_path: config_path.to_string(),
        workspace: None,
        agent_timeout_secs: None,
        show_sensitive_config: false,
        log_filter: "error".to_string(),
        command: Commands::Doctor,
    }
}

#[test]
fn extract_json_object_recovers_json_wrapped_in_prose() {
    let output = "Here is my analysis:\n```json\n{\"requires_multiple_agents\": true}\n```\nDone.";
    let value = extract_json_object(output).expect("embedded JSON should parse");
    assert_eq!(value["requires_multiple_agents"], true);
}

#[test]
fn extract_json_object_rejects_output_without_json() {
    assert!(extract_json_object("no structured data here").is_none());
    assert!(extract_json_object("} backwards {").is_none());
    assert!(extract_json_object("{ not json }").is_none());
}

#[test]
fn extract_section_stops_at_next_heading() {
    let output = "### Perfected Prompt\nBuild a login page.\nWith tests.\n\n### Task Categorization\nCategory: frontend\n";
    let section = extract_section(output, "Perfected Prompt").expect("section should be found");
    assert_eq!(section, "Build a login page.\nWith tests.");
    assert!(extract_section(output, "Missing Section").is_none());
}

#[test]
fn extract_category_handles_decoration_and_case() {
    assert_eq!(
        extract_category("### Task Categorization\nCategory: [Backend]\nReason: APIs").as_deref(),
        Some("backend")
    );
    assert_eq!(
        extract_category("category: full-stack because both layers change").as_deref(),
        Some("full-stack")
    );
    assert!(extract_category("no category line at all").is_none());
}

#[test]
fn parse_questions_strips_list_markers() {
    let output = "### Questions Needed\n1. Which database?\n2) Which framework?\n- Do you need auth?\n\n### Analysis\nAmbiguous scope.";
    let questions = parse_questions(output);
    assert_eq!(
        questions,
        vec![
            "Which database?".to_string(),
            "Which framework?".to_string(),
            "Do you need auth?".to_string(),
        ]
    );
}

#[test]
fn parse_questions_treats_none_as_empty() {
    let output = "### Questions Needed\nNone\n\n### Analysis\nPrompt is complete.";
    assert!(parse_questions(output).is_empty());
    assert!(parse_questions("no questions section").is_empty());
}

#[test]
fn category_parse_lenient_maps_unknown_to_other() {
    assert_eq!(Category::parse_lenient("Frontend"), Category::Frontend);
    assert_eq!(Category::parse_lenient("full_stack"), Category::FullStack);
    assert_eq!(Category::parse_lenient("fullstack"), Category::FullStack);
    assert_eq!(Category::parse_lenient("devops"), Category::Other);
    assert_eq!(Category::parse_lenient(""), Category::Other);
}

#[test]
fn splitter_result_parses_embedded_json() {
    let output = r#"Analysis complete.
{
  "requires_multiple_agents": true,
  "agents_needed": ["backend", "frontend"],
  "execution_strategy": "sequential",
  "execution_order": [
    {"agent": "backend", "focus": "API layer", "reason": "data first"},
    {"agent": "frontend", "focus": "UI", "reason": "consumes API"}
  ],
  "summary": "Two-layer task"
}"#;

    let result = SplitterResult::from_output(output).expect("splitter JSON should parse");
    assert!(result.requires_multiple_agents);
    assert_eq!(result.agents_needed, vec!["backend", "frontend"]);
    assert_eq!(result.execution_order.len(), 2);
    assert_eq!(result.execution_order[0].agent, "backend");
    assert_eq!(result.execution_order[1].focus, "UI");
}

#[test]
fn splitter_result_tolerates_missing_fields() {
    let result = SplitterResult::from_output(r#"{"agents_needed": ["cloud"]}"#)
        .expect("partial splitter JSON should still parse");
    assert!(!result.requires_multiple_agents);
    assert_eq!(result.execution_strategy, "sequential");
    assert!(result.execution_order.is_empty());
}

#[test]
fn splitter_fallback_is_single_agent_sequential() {
    assert!(SplitterResult::from_output("I could not produce JSON, sorry").is_none());

    let fallback = SplitterResult::fallback("unparseable output");
    assert!(!fallback.requires_multiple_agents);
    assert!(fallback.agents_needed.is_empty());
    assert_eq!(fallback.execution_strategy, "sequential");
    assert_eq!(fallback.summary, "unparseable output");
}

#[test]
fn catalog_lookup_matches_key_and_display_name() {
    let catalog = AgentCatalog::with_custom_dir(None);

    let by_key = catalog.lookup("backend").expect("backend key should resolve");
    assert_eq!(by_key.display_name, "backend-architect");

    let by_display = catalog
        .lookup("backend-architect")
        .expect("display name should resolve");
    assert_eq!(by_display.key, "backend");

    assert!(catalog.lookup("nonexistent-agent").is_none());
}

#[test]
fn catalog_specialists_exclude_composites() {
    let catalog = AgentCatalog::with_custom_dir(None);
    let specialists = catalog.specialist_names();

    assert!(specialists.contains(&"frontend".to_string()));
    assert!(specialists.contains(&"composer".to_string()));
    assert!(!specialists.contains(&"full-stack".to_string()));

    let all = catalog.all_names();
    assert!(all.contains(&"full-stack".to_string()));
}

#[test]
fn custom_agents_discovered_and_conflicts_skipped() {
    let dir = tempdir().expect("temp directory should create");
    std::fs::write(dir.path().join("rust-expert.md"), "# Rust expert\n")
        .expect("fixture file should write");
    std::fs::write(dir.path().join("backend.md"), "# Shadowing built-in\n")
        .expect("fixture file should write");
    std::fs::write(dir.path().join(".hidden.md"), "ignored").expect("fixture file should write");
    std::fs::write(dir.path().join("notes.txt"), "ignored").expect("fixture file should write");

    let catalog = AgentCatalog::with_custom_dir(Some(dir.path()));
    let custom_keys = catalog
        .custom
        .iter()
        .map(|agent| agent.key.as_str())
        .collect::<Vec<&str>>();

    assert_eq!(custom_keys, vec!["rust-expert"]);
    assert!(catalog.lookup("rust-expert").is_some());
    // The built-in wins lookup for the conflicting name.
    let backend = catalog.lookup("backend").expect("backend should resolve");
    assert!(!backend.custom);
}

#[test]
fn strip_frontmatter_removes_leading_yaml_block() {
    let content = "---\nname: backend-architect\nmodel: composer-1\n---\n\nYou design APIs.";
    assert_eq!(strip_frontmatter(content), "You design APIs.");

    let no_frontmatter = "You design APIs.\n\n---\n\nFooter rule.";
    assert_eq!(
        strip_frontmatter(no_frontmatter),
        "You design APIs.\n\n---\n\nFooter rule."
    );
}

#[test]
fn load_agent_instructions_degrades_to_empty_when_missing() {
    let dir = tempdir().expect("temp directory should create");
    let instructions = load_agent_instructions(
        std::path::Path::new("does-not-exist.md"),
        "agents",
        Some(dir.path()),
    );
    assert!(instructions.is_empty());
}

#[test]
fn load_agent_instructions_resolves_workspace_relative_file() {
    let dir = tempdir().expect("temp directory should create");
    let agents_dir = dir.path().join("agents");
    std::fs::create_dir_all(&agents_dir).expect("fixture dir should create");
    std::fs::write(
        agents_dir.join("backend-architect.md"),
        "---\nname: backend\n---\nDesign the API first.",
    )
    .expect("fixture file should write");

    let instructions = load_agent_instructions(
        std::path::Path::new("backend-architect.md"),
        "agents",
        Some(dir.path()),
    );
    assert_eq!(instructions, "Design the API first.");
}

#[test]
fn plan_slug_filters_caps_and_lowercases() {
    assert_eq!(
        plan_slug("Build a REST API! (with auth)", 50, "plan"),
        "build-a-rest-api-with-auth"
    );
    assert_eq!(plan_slug("@@@!!!", 50, "plan"), "plan");

    let long = "words ".repeat(20);
    let slug = plan_slug(&long, 30, "plan");
    assert!(slug.len() <= 30, "slug should respect the cap: {slug}");
}

#[test]
fn plans_directory_prefers_existing_workspace_plans() {
    let dir = tempdir().expect("temp directory should create");
    let cfg = base_cfg();

    // Without a plans/ dir in the workspace, the default relative dir wins.
    assert_eq!(
        plans_directory(&cfg, Some(dir.path())),
        std::path::PathBuf::from("plans")
    );

    std::fs::create_dir_all(dir.path().join("plans")).expect("fixture dir should create");
    assert_eq!(plans_directory(&cfg, Some(dir.path())), dir.path().join("plans"));
}

#[test]
fn output_builder_renders_structured_markdown() {
    let mut output = OutputBuilder::new();
    output
        .header_level("Report", 1)
        .blank()
        .header("Summary")
        .field("Agents", "backend, frontend")
        .bullet("first")
        .numbered(2, "second")
        .code("{}", "json")
        .separator();

    let text = output.build();
    assert!(text.starts_with("# Report\n"));
    assert!(text.contains("## Summary"));
    assert!(text.contains("**Agents**: backend, frontend"));
    assert!(text.contains("- first"));
    assert!(text.contains("2. second"));
    assert!(text.contains("```json\n{}\n```"));
    assert!(text.ends_with("---"));
}

#[test]
fn truncate_output_appends_marker_only_when_cut() {
    assert_eq!(truncate_output("short", 100), "short");

    let truncated = truncate_output("abcdefgh", 4);
    assert_eq!(truncated, "abcd\n\n... (output truncated)");

    // Multi-byte content must be cut on char boundaries.
    let truncated = truncate_output("日本語テキスト", 3);
    assert_eq!(truncated, "日本語\n\n... (output truncated)");
}

#[test]
fn load_profiles_missing_file_yields_defaults() {
    let profiles = load_profiles("/nonexistent/agent-squared-config.toml")
        .expect("missing config should not error");
    assert!(profiles.profiles.is_empty());
}

#[test]
fn load_profiles_rejects_unknown_fields() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.default]\nmodell = \"typo\"\n")
        .expect("fixture file should write");

    let err = load_profiles(path.to_str().expect("path should be utf-8"))
        .expect_err("unknown field should be rejected");
    assert!(format!("{err:#}").contains("invalid profile configuration"));
}

#[test]
fn resolve_runtime_config_applies_cli_over_profile() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[profiles.fast]\nmodel = \"profile-model\"\nagent_timeout_secs = 120\nmax_output_chars = 512\n",
    )
    .expect("fixture file should write");
    let config_path = path.to_str().expect("path should be utf-8");

    let profiles = load_profiles(config_path).expect("profiles should load");

    let mut cli = test_cli(config_path, "fast");
    cli.model = Some("cli-model".to_string());
    let cfg = resolve_runtime_config(&cli, &profiles).expect("config should resolve");
    assert_eq!(cfg.model, "cli-model");
    assert_eq!(cfg.agent_timeout_secs, 120);
    assert_eq!(cfg.max_output_chars, 512);

    let cli = test_cli(config_path, "fast");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("config should resolve");
    assert_eq!(cfg.model, "profile-model");
}

#[test]
fn resolve_runtime_config_defaults_when_profile_absent() {
    let profiles = ProfilesFile::default();
    let cli = test_cli(".agent-squared/config.toml", "default");
    let cfg = resolve_runtime_config(&cli, &profiles).expect("default profile should resolve");
    assert_eq!(cfg.model, DEFAULT_MODEL);
    assert_eq!(cfg.agent_timeout_secs, DEFAULT_AGENT_TIMEOUT_SECS);
    assert_eq!(cfg.instructions_dir, "agents");
}

#[test]
fn resolve_runtime_config_lists_available_profiles_on_miss() {
    let dir = tempdir().expect("temp directory should create");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.alpha]\n[profiles.beta]\n")
        .expect("fixture file should write");
    let config_path = path.to_str().expect("path should be utf-8");

    let profiles = load_profiles(config_path).expect("profiles should load");
    let cli = test_cli(config_path, "gamma");
    let err = resolve_runtime_config(&cli, &profiles).expect_err("unknown profile should fail");
    let message = format!("{err:#}");
    assert!(message.contains("profile 'gamma' not found"));
    assert!(message.contains("alpha, beta"));
}

#[test]
fn error_categorization_maps_known_failures() {
    let agent = anyhow::anyhow!("cursor-agent not found. Install with: ...");
    assert_eq!(categorize_error(&agent), ErrorCategory::Agent);

    let timeout = anyhow::anyhow!("agent execution timed out after 600 seconds");
    assert_eq!(categorize_error(&timeout), ErrorCategory::Agent);

    let workspace = anyhow::anyhow!("workspace directory does not exist: /tmp/nope");
    assert_eq!(categorize_error(&workspace), ErrorCategory::Workspace);

    let config = anyhow::anyhow!("profile 'x' not found in 'config.toml'");
    assert_eq!(categorize_error(&config), ErrorCategory::Config);

    let input = anyhow::anyhow!("agent 'bogus' not found. Run 'agents list' to see available agents.");
    assert_eq!(categorize_error(&input), ErrorCategory::Input);

    let internal = anyhow::anyhow!("something unexpected");
    assert_eq!(categorize_error(&internal), ErrorCategory::Internal);
}

#[test]
fn error_exit_codes_are_distinct_and_stable() {
    assert_eq!(ErrorCategory::Internal.exit_code(), 1);
    assert_eq!(ErrorCategory::Input.exit_code(), 2);
    assert_eq!(ErrorCategory::Workspace.exit_code(), 3);
    assert_eq!(ErrorCategory::Config.exit_code(), 4);
    assert_eq!(ErrorCategory::Agent.exit_code(), 5);
}

#[test]
fn format_cli_error_includes_code_and_hint() {
    let err = anyhow::anyhow!("workspace directory does not exist: /tmp/nope");
    let formatted = format_cli_error(&err);
    assert!(formatted.starts_with("[WORKSPACE]"));
    assert!(formatted.contains("Hint: Pass --workspace"));
}

#[test]
fn resolve_workspace_validates_requested_path() {
    let dir = tempdir().expect("temp directory should create");
    let resolved = resolve_workspace(Some(dir.path().to_str().expect("path should be utf-8")))
        .expect("existing directory should resolve");
    assert_eq!(resolved, dir.path());

    let err = resolve_workspace(Some("/definitely/not/a/real/path"))
        .expect_err("missing directory should fail");
    assert!(format!("{err:#}").contains("workspace directory does not exist"));

    let file_path = dir.path().join("file.txt");
    std::fs::write(&file_path, "x").expect("fixture file should write");
    let err = resolve_workspace(Some(file_path.to_str().expect("path should be utf-8")))
        .expect_err("plain file should fail");
    assert!(format!("{err:#}").contains("not a directory"));
}

#[test]
fn mask_api_key_keeps_only_edges() {
    assert_eq!(mask_api_key("sk-abcdefghijklmnop"), "sk-abcde...mnop");
    assert_eq!(mask_api_key("short"), "****");
    assert_eq!(mask_api_key(""), "****");
}

#[test]
fn invocation_print_args_follow_cli_contract() {
    let invocation = AgentInvocation {
        prompt: "Build it",
        instructions: Some("You are the backend architect."),
        model: "composer-1",
        output_format: "text",
        workspace_dir: None,
        timeout_secs: 600,
        api_key: Some("sk-test"),
    };

    let args = invocation.print_args();
    assert_eq!(args[0], "--api-key");
    assert_eq!(args[1], "sk-test");
    assert_eq!(args[2], "-p");
    assert_eq!(
        args[3],
        "You are the backend architect.\n\nUser Request: Build it"
    );
    assert_eq!(&args[4..], &["--output-format", "text", "--model", "composer-1", "--force"]);
}

#[test]
fn invocation_omits_empty_instructions_and_api_key() {
    let invocation = AgentInvocation {
        prompt: "Build it",
        instructions: Some("   "),
        model: "composer-1",
        output_format: "text",
        workspace_dir: None,
        timeout_secs: 600,
        api_key: None,
    };

    assert_eq!(invocation.full_prompt(), "Build it");
    let args = invocation.print_args();
    assert_eq!(args[0], "-p");
    assert!(!args.contains(&"--api-key".to_string()));

    let interactive = invocation.interactive_args();
    assert_eq!(interactive, vec!["--model", "composer-1", "Build it"]);
}

#[test]
fn pipeline_report_truncates_and_counts_overflow_files() {
    let mut cfg = base_cfg();
    cfg.max_output_chars = 16;
    cfg.max_composer_output_chars = 16;
    cfg.max_modified_files_shown = 2;

    let result = PipelineResult {
        agents_used: vec!["backend".to_string(), "frontend".to_string()],
        agent_outputs: vec![
            ExecutionRecord {
                agent: "backend".to_string(),
                focus: "API layer".to_string(),
                output: "a".repeat(64),
            },
            ExecutionRecord {
                agent: "frontend".to_string(),
                focus: String::new(),
                output: "ok".to_string(),
            },
        ],
        composer_output: Some("b".repeat(64)),
        detected_category: Category::FullStack,
        perfected_prompt: "Build the thing".to_string(),
        modified_files: vec![
            "src/api.rs".to_string(),
            "src/ui.rs".to_string(),
            "src/db.rs".to_string(),
        ],
    };

    let report = render_pipeline_report(&cfg, &result, std::path::Path::new("/tmp/project"));
    assert!(report.contains("**Agents executed**: backend, frontend"));
    assert!(report.contains("**Category**: full-stack"));
    assert!(report.contains("... (output truncated)"));
    assert!(report.contains("... and 1 more"));
    assert!(report.contains("**Focus**: API layer"));
    assert!(report.contains("DO NOT re-implement"));
    assert!(report.contains("NO FURTHER IMPLEMENTATION NEEDED"));
}

#[test]
fn refined_prompt_appends_clarifications_in_order() {
    assert_eq!(build_refined_prompt("Build it", &[]), "Build it");

    let answers = vec![
        ("Which database?".to_string(), "Postgres".to_string()),
        ("Need auth?".to_string(), "Yes, JWT".to_string()),
    ];
    let refined = build_refined_prompt("Build it", &answers);
    assert!(refined.starts_with("Build it\n\n### Clarifications:\n"));
    let db_pos = refined
        .find("- Which database?: Postgres")
        .expect("first answer should be present");
    let auth_pos = refined
        .find("- Need auth?: Yes, JWT")
        .expect("second answer should be present");
    assert!(db_pos < auth_pos, "answers should keep insertion order");
}

#[test]
fn role_agents_point_at_instruction_files() {
    let splitter = splitter_agent();
    assert!(!splitter.is_composite());
    let AgentKind::Instruction { file } = &splitter.kind else {
        panic!("splitter should be instruction-backed");
    };
    assert_eq!(file.to_str(), Some("splitter-agent.md"));

    assert!(!prompt_engineer_agent().is_composite());
    assert!(!composer_agent().is_composite());

    let catalog = AgentCatalog::with_custom_dir(None);
    let full_stack = catalog.lookup("full-stack").expect("full-stack should exist");
    let AgentKind::Composite { members } = &full_stack.kind else {
        panic!("full-stack should be composite");
    };
    assert_eq!(members, &["backend".to_string(), "frontend".to_string()]);
}

#[tokio::test]
async fn modified_files_is_empty_outside_git_repo() {
    let dir = tempdir().expect("temp directory should create");
    let files = modified_files(dir.path(), 5).await;
    assert!(files.is_empty());
}

#[tokio::test]
async fn run_agent_degrades_when_binary_is_absent() {
    let _env = ENV_LOCK.lock().expect("env lock should not be poisoned");
    // Point PATH and HOME at an empty sandbox so discovery cannot succeed.
    let dir = tempdir().expect("temp directory should create");
    let saved = set_env_sandbox(dir.path(), dir.path());

    let invocation = AgentInvocation {
        prompt: "hello",
        instructions: None,
        model: "composer-1",
        output_format: "text",
        workspace_dir: Some(dir.path()),
        timeout_secs: 5,
        api_key: None,
    };
    let result = run_agent_detailed(&invocation).await;

    restore_env_sandbox(saved);

    assert_eq!(result.status, AgentRunStatus::BinaryNotFound);
    assert!(result.stdout.is_empty());
    assert!(
        result
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("cursor-agent not found")
    );
}

#[tokio::test]
async fn forced_category_runs_only_the_specialist() {
    let _env = ENV_LOCK.lock().expect("env lock should not be poisoned");
    let dir = tempdir().expect("temp directory should create");
    let log_path = install_fake_agent(dir.path());
    let saved = set_env_sandbox(&dir.path().join("bin"), dir.path());

    let cfg = base_cfg();
    let catalog = AgentCatalog::with_custom_dir(None);
    let options = PipelineOptions {
        interactive: false,
        skip_splitter: false,
        skip_prompt_engineering: false,
        forced_category: Some(Category::Backend),
        create_plans: false,
    };
    let result = run_pipeline(&cfg, &catalog, "Add an endpoint", options, dir.path()).await;

    restore_env_sandbox(saved);

    let result = result.expect("pipeline should succeed");
    assert_eq!(result.detected_category, Category::Backend);
    assert_eq!(result.agents_used, vec!["backend".to_string()]);
    // Splitter and prompt engineering are bypassed; one specialist call only.
    assert_eq!(agent_call_count(&log_path), 1);
}

#[tokio::test]
async fn skipping_prompt_engineering_also_skips_the_splitter() {
    let _env = ENV_LOCK.lock().expect("env lock should not be poisoned");
    let dir = tempdir().expect("temp directory should create");
    let log_path = install_fake_agent(dir.path());
    let saved = set_env_sandbox(&dir.path().join("bin"), dir.path());

    let cfg = base_cfg();
    let catalog = AgentCatalog::with_custom_dir(None);
    let options = PipelineOptions {
        interactive: false,
        skip_splitter: false,
        skip_prompt_engineering: true,
        forced_category: None,
        create_plans: false,
    };
    let result = run_pipeline(&cfg, &catalog, "Tidy the docs", options, dir.path()).await;

    restore_env_sandbox(saved);

    let result = result.expect("pipeline should succeed");
    assert_eq!(result.detected_category, Category::Other);
    assert_eq!(agent_call_count(&log_path), 1);
}

#[tokio::test]
async fn clarification_read_yields_none_on_interrupt() {
    let response = read_line_or_interrupt("", std::future::ready(()))
        .await
        .expect("interrupted read should not error");
    assert!(response.is_none());
}

#[test]
fn mcp_server_exposes_name_and_tools() {
    let server = AgentSquaredServer::new(base_cfg());
    let info = server.get_info();
    assert_eq!(info.server_info.name, "agent-squared");
    assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
    assert!(info.capabilities.tools.is_some());
}

#[tokio::test]
async fn version_probe_reports_fake_binary_version() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().expect("temp directory should create");
    let script_path = dir.path().join("cursor-agent");
    std::fs::write(&script_path, "#!/bin/sh\necho \"cursor-agent 1.2.3\"\n")
        .expect("fixture script should write");
    std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
        .expect("fixture script should be marked executable");

    let report = probe_version(&script_path).await;
    assert_eq!(report, "Version: `cursor-agent 1.2.3`");
}
