use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;

use agent_squared::agents::{AgentCatalog, AgentKind};
use agent_squared::clarify::interactive_clarification;
use agent_squared::cli::{AgentCommands, Cli, Commands, command_label};
use agent_squared::config::{
    RuntimeConfig, display_api_key, load_profiles, resolve_runtime_config,
};
use agent_squared::doctor::run_doctor;
use agent_squared::error::{categorize_error, format_cli_error};
use agent_squared::mcp::run_mcp_server;
use agent_squared::pipeline::{PipelineOptions, render_pipeline_report, run_pipeline};
use agent_squared::planner::create_plan;
use agent_squared::workspace::resolve_workspace;

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    // Stdout stays clean for command output and MCP JSON-RPC.
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let label = command_label(&cli.command);
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        let category = categorize_error(&err);
        tracing::error!(command = %label, category = %category.code(), error = %err, "command failed");
        std::process::exit(category.exit_code());
    }
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;

    match cli.command {
        Commands::Run {
            prompt,
            interactive,
            skip_splitter,
            skip_prompt_engineering,
            skip_clarification,
            category,
            plan,
            plan_only,
        } => {
            let prompt = prompt.join(" ");
            run_chain(
                &cfg,
                &prompt,
                RunFlags {
                    interactive,
                    skip_splitter,
                    skip_prompt_engineering,
                    skip_clarification,
                    category,
                    plan,
                    plan_only,
                },
            )
            .await?;
        }
        Commands::Plan { prompt } => {
            let prompt = prompt.join(" ");
            let workspace_dir = resolve_workspace(cfg.workspace.as_deref())?;
            match create_plan(&cfg, &prompt, Some(&workspace_dir), None, None).await? {
                Some(path) => println!("Plan saved to {}", path.display()),
                None => println!("No plan content was generated."),
            }
        }
        Commands::Agents { command } => match command {
            AgentCommands::List => run_agents_list(&cfg)?,
            AgentCommands::Show { name } => run_agents_show(&cfg, &name)?,
        },
        Commands::Doctor => {
            run_doctor(&cfg).await?;
        }
        Commands::Serve => {
            run_mcp_server(cfg).await?;
        }
    }

    Ok(())
}

struct RunFlags {
    interactive: bool,
    skip_splitter: bool,
    skip_prompt_engineering: bool,
    skip_clarification: bool,
    category: Option<agent_squared::cli::Category>,
    plan: bool,
    plan_only: bool,
}

async fn run_chain(cfg: &RuntimeConfig, prompt: &str, flags: RunFlags) -> Result<()> {
    let workspace_dir = resolve_workspace(cfg.workspace.as_deref())?;
    let catalog = AgentCatalog::load(cfg);

    println!("Workspace: {}", workspace_dir.display());
    println!("Initial prompt: {prompt}\n");

    if flags.plan || flags.plan_only {
        match create_plan(cfg, prompt, Some(&workspace_dir), None, None).await? {
            Some(path) => println!("Plan saved to {}", path.display()),
            None => println!("No plan content was generated."),
        }
        if flags.plan_only {
            println!("Plan-only mode: exiting after plan creation.");
            return Ok(());
        }
    }

    let clarified_prompt = if !flags.skip_clarification
        && !flags.skip_prompt_engineering
        && flags.category.is_none()
    {
        interactive_clarification(cfg, prompt, Some(&workspace_dir)).await?
    } else {
        prompt.to_string()
    };

    let options = PipelineOptions {
        interactive: flags.interactive,
        skip_splitter: flags.skip_splitter,
        skip_prompt_engineering: flags.skip_prompt_engineering,
        forced_category: flags.category,
        create_plans: true,
    };

    let result = run_pipeline(cfg, &catalog, &clarified_prompt, options, &workspace_dir)
        .await
        .context("agent pipeline failed")?;

    println!("{}", render_pipeline_report(cfg, &result, &workspace_dir));
    Ok(())
}

fn run_agents_list(cfg: &RuntimeConfig) -> Result<()> {
    let catalog = AgentCatalog::load(cfg);

    println!("Core agents:");
    for agent in &catalog.core {
        match &agent.kind {
            AgentKind::Instruction { file } => {
                println!("- {} ({}) file={}", agent.key, agent.display_name, file.display());
            }
            AgentKind::Composite { members } => {
                println!("- {} (composite: {})", agent.key, members.join(" -> "));
            }
        }
    }

    println!("\nAdditional agents:");
    for agent in &catalog.additional {
        println!("- {} ({})", agent.key, agent.display_name);
    }

    if catalog.custom.is_empty() {
        match cfg.custom_agents_dir.as_deref() {
            Some(dir) => println!("\nNo custom agents found in {}", dir.display()),
            None => println!("\nNo custom agents directory configured."),
        }
    } else {
        println!("\nCustom agents:");
        for agent in &catalog.custom {
            println!("- {} (custom)", agent.key);
        }
    }

    println!("\nActive model: {} (api key: {})", cfg.model, display_api_key(cfg));
    Ok(())
}

fn run_agents_show(cfg: &RuntimeConfig, name: &str) -> Result<()> {
    let catalog = AgentCatalog::load(cfg);
    let agent = catalog
        .lookup(name)
        .ok_or_else(|| anyhow::anyhow!("agent '{}' not found. Run 'agents list' to see available agents.", name))?;

    println!("Key: {}", agent.key);
    println!("Display name: {}", agent.display_name);
    println!("Custom: {}", agent.custom);
    match &agent.kind {
        AgentKind::Instruction { file } => {
            println!("Instruction file: {}", file.display());
            println!("Instructions dir: {}", cfg.instructions_dir);
        }
        AgentKind::Composite { members } => {
            println!("Composite members: {}", members.join(", "));
        }
    }

    Ok(())
}
