use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(name = "openai", alias = "open-ai")]
    OpenAI,
    Anthropic,
    Ollama,
}

#[derive(Parser, Debug)]
#[command(
    name = "sdlc_assistant",
    version,
    about = "Walks requirements through HLD, technical design and code generation with an LLM"
)]
pub struct Args {
    /// Optional TOML config file; values are overridden by env and flags
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    pub provider: Option<ProviderKind>,

    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Directory for diagrams, snapshots and archives
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    pub save_transcripts: bool,

    #[arg(long, global = true, default_value_t = false)]
    pub no_progress: bool,

    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive walkthrough: requirements, HLD, technical design, code
    Run(RunArgs),
    /// Run every stage without prompting, accepting each generated text
    Pipeline(PipelineArgs),
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[arg(long)]
    pub name: Option<String>,

    /// File holding the requirements text
    #[arg(long)]
    pub requirements: Option<PathBuf>,

    /// Resume from a saved snapshot
    #[arg(long)]
    pub load: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct PipelineArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub requirements: PathBuf,

    /// Save a snapshot once the technical design is in place
    #[arg(long, default_value_t = false)]
    pub snapshot: bool,
}
