use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Frontend,
    Backend,
    Cloud,
    FullStack,
    Other,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Frontend => "frontend",
            Category::Backend => "backend",
            Category::Cloud => "cloud",
            Category::FullStack => "full-stack",
            Category::Other => "other",
        }
    }

    /// Parses a category token from agent output. Unknown tokens map to `Other`.
    pub fn parse_lenient(value: &str) -> Category {
        match value.trim().to_ascii_lowercase().as_str() {
            "frontend" => Category::Frontend,
            "backend" => Category::Backend,
            "cloud" => Category::Cloud,
            "full-stack" | "fullstack" | "full_stack" => Category::FullStack,
            _ => Category::Other,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum AgentCommands {
    #[command(about = "List built-in, additional, and custom agents")]
    List,
    #[command(about = "Show a resolved agent definition")]
    Show {
        #[arg(long)]
        name: String,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  agent-squared run \"Build a login page with authentication\"\n\
  agent-squared run \"Create a REST API for user management\" --interactive\n\
  agent-squared run \"Add dark mode to the app\" --skip-prompt-engineering\n\
  agent-squared run \"Ship the billing service\" --category backend --workspace ~/code/billing\n\
  agent-squared run \"Design the release\" --plan-only\n\
  agent-squared plan \"Migrate the worker fleet to spot instances\"\n\
  agent-squared agents list\n\
  agent-squared agents show --name code-reviewer\n\
  agent-squared doctor\n\
  agent-squared serve\n\
\n\
Pipeline phases for `run`:\n\
  splitter -> clarification -> prompt engineering -> specialists -> composer\n\
  Skip flags remove individual phases; --category forces the specialist directly.";

#[derive(Debug, Parser)]
#[command(name = "agent-squared")]
#[command(about = "Chain specialist AI agents: splitter -> prompt engineer -> specialists -> composer")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "CURSOR_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "AGENT_SQUARED_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "AGENT_SQUARED_CONFIG", default_value = ".agent-squared/config.toml")]
    pub config_path: String,

    #[arg(long, env = "AGENT_SQUARED_WORKSPACE")]
    pub workspace: Option<String>,

    #[arg(long, env = "AGENT_SQUARED_TIMEOUT_SECS")]
    pub agent_timeout_secs: Option<u64>,

    #[arg(long, env = "AGENT_SQUARED_SHOW_SENSITIVE_CONFIG", default_value_t = false)]
    pub show_sensitive_config: bool,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run the full agent pipeline for a prompt")]
    Run {
        #[arg(required = true)]
        prompt: Vec<String>,
        #[arg(long, default_value_t = false)]
        interactive: bool,
        #[arg(long, default_value_t = false)]
        skip_splitter: bool,
        #[arg(long, default_value_t = false)]
        skip_prompt_engineering: bool,
        #[arg(long, default_value_t = false)]
        skip_clarification: bool,
        #[arg(long, value_enum)]
        category: Option<Category>,
        #[arg(long, default_value_t = false)]
        plan: bool,
        #[arg(long, default_value_t = false)]
        plan_only: bool,
    },
    #[command(about = "Create a plan document for a prompt without executing agents")]
    Plan {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    #[command(about = "Inspect the agent catalog")]
    Agents {
        #[command(subcommand)]
        command: AgentCommands,
    },
    #[command(about = "Validate model configuration and the external agent CLI")]
    Doctor,
    #[command(about = "Run the MCP stdio server so a host chat client can drive the pipeline")]
    Serve,
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Run { .. } => "run".to_string(),
        Commands::Plan { .. } => "plan".to_string(),
        Commands::Agents { command } => match command {
            AgentCommands::List => "agents.list".to_string(),
            AgentCommands::Show { .. } => "agents.show".to_string(),
        },
        Commands::Doctor => "doctor".to_string(),
        Commands::Serve => "serve".to_string(),
    }
}
