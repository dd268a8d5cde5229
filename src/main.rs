use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use fs_err as fs;
use uuid::Uuid;

mod archive;
mod cli;
mod completion;
mod config;
mod diagram;
mod errors;
mod exec;
mod log;
mod naming;
mod prompt;
mod provider;
mod snapshot;
mod stages;
mod structure;
mod ux;
mod wire;
mod workflow;

use cli::{Command, PipelineArgs, RunArgs};
use completion::CompletionClient;
use config::Config;
use diagram::DiagramRenderer;
use workflow::{SnapshotLoad, Stage, Workflow};

fn init_tracing(debug: bool) {
    let default_level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_workflow(cfg: &Config) -> Result<Workflow> {
    let provider = provider::make_provider(cfg)?;
    let mut client = CompletionClient::new(provider, cfg.model.clone(), cfg.temperature, cfg.max_tokens);
    if cfg.save_transcripts {
        let transcript = log::Transcript::new(&cfg.out_dir, Uuid::new_v4());
        tracing::info!(dir = %transcript.dir().display(), "saving transcripts");
        client = client.with_transcript(transcript);
    }
    let renderer = DiagramRenderer::new(cfg.dot_program.clone(), cfg.diagram_format.clone(), cfg.out_dir.clone());
    Ok(Workflow::new(client, renderer, cfg.out_dir.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.debug);

    let cfg = Config::resolve(&args)?;
    tracing::debug!(?cfg, "resolved config");
    let progress = !args.no_progress;

    let mut wf = build_workflow(&cfg)?;
    match args.command {
        Command::Run(run) => run_interactive(&mut wf, run, progress).await,
        Command::Pipeline(p) => run_pipeline(&mut wf, p, progress).await,
    }
}

async fn run_pipeline(wf: &mut Workflow, args: PipelineArgs, progress: bool) -> Result<()> {
    let requirements = fs::read_to_string(&args.requirements)
        .with_context(|| format!("reading requirements {}", args.requirements.display()))?;

    ux::banner(Stage::Requirements);
    let pb = ux::spinner("Generating high-level design", progress);
    let (stage, hld) = wf.submit_requirements(&args.name, &requirements).await;
    ux::finish(pb);
    ux::banner(stage);
    ux::show_stage_result(&hld);

    let pb = ux::spinner("Generating technical design", progress);
    let (stage, tech) = wf.submit_hld(&hld.display_text).await;
    ux::finish(pb);
    ux::banner(stage);
    ux::show_stage_result(&tech);

    let stage = wf.submit_technical_design(&tech.display_text);
    if args.snapshot {
        save_snapshot(wf);
    }

    ux::banner(stage);
    let pb = ux::spinner("Generating code", progress);
    let outcome = wf.generate_code().await;
    ux::finish(pb);
    ux::print_code_dashboard(&outcome);
    Ok(())
}

async fn run_interactive(wf: &mut Workflow, args: RunArgs, progress: bool) -> Result<()> {
    println!("{}", "Software Development Life Cycle Assistant".bold());

    let mut name = args.name.unwrap_or_default();
    let mut requirements = match &args.requirements {
        Some(p) => fs::read_to_string(p).with_context(|| format!("reading requirements {}", p.display()))?,
        None => String::new(),
    };
    let mut hld = String::new();
    let mut technical = String::new();

    if let Some(path) = &args.load {
        let loaded = wf.load_snapshot(path);
        let (r, h, t) = loaded.fields();
        match &loaded {
            SnapshotLoad::Restored { .. } => {
                name = wf.state().project_name.clone();
                requirements = r.to_string();
                hld = h.to_string();
                technical = t.to_string();
                println!("{} {}", "Restored".green().bold(), path.display());
                if let Some(text) = ux::resume_text(wf.stage(), &hld, &technical) {
                    println!("\n{}\n", text);
                }
            }
            SnapshotLoad::Failed { reason } => {
                println!("{} ({})", r.red().bold(), reason);
            }
        }
    }

    let mut stage = wf.stage();
    loop {
        ux::banner(stage);
        match stage {
            Stage::Requirements => {
                if name.is_empty() {
                    name = ux::prompt_line("Project name")?;
                }
                if requirements.trim().is_empty() {
                    requirements = ux::edit_text("")?;
                } else {
                    println!("\n{}\n", requirements);
                }
                if ux::confirm("Have the requirements reviewed and restructured first?") {
                    let pb = ux::spinner("Reviewing requirements", progress);
                    let reviewed = wf.refine_requirements(&requirements).await;
                    ux::finish(pb);
                    ux::show_stage_result(&reviewed);
                    if !reviewed.degraded && ux::confirm("Use the reviewed requirements?") {
                        requirements = reviewed.display_text;
                    }
                }
                (stage, hld) = generate_hld(wf, &name, &requirements, progress).await;
            }
            Stage::Hld => match ux::choose()? {
                ux::Choice::Accept => (stage, technical) = generate_technical(wf, &hld, progress).await,
                ux::Choice::Edit => {
                    hld = ux::edit_text(&hld)?;
                    println!("\n{}\n", hld);
                }
                ux::Choice::Regenerate => (stage, hld) = generate_hld(wf, &name, &requirements, progress).await,
                ux::Choice::Save => save_snapshot(wf),
                ux::Choice::Quit => return Ok(()),
            },
            Stage::TechnicalDesign => match ux::choose()? {
                ux::Choice::Accept => stage = wf.submit_technical_design(&technical),
                ux::Choice::Edit => {
                    technical = ux::edit_text(&technical)?;
                    println!("\n{}\n", technical);
                }
                ux::Choice::Regenerate => (stage, technical) = generate_technical(wf, &hld, progress).await,
                ux::Choice::Save => save_snapshot(wf),
                ux::Choice::Quit => return Ok(()),
            },
            Stage::CodeGeneration => {
                let pb = ux::spinner("Generating code", progress);
                let outcome = wf.generate_code().await;
                ux::finish(pb);
                ux::print_code_dashboard(&outcome);
                ux::preview_loop(wf)?;
                if !ux::confirm("Regenerate the code?") {
                    return Ok(());
                }
            }
        }
    }
}

async fn generate_hld(wf: &mut Workflow, name: &str, requirements: &str, progress: bool) -> (Stage, String) {
    let pb = ux::spinner("Generating high-level design", progress);
    let (next, res) = wf.submit_requirements(name, requirements).await;
    ux::finish(pb);
    ux::show_stage_result(&res);
    (next, res.display_text)
}

async fn generate_technical(wf: &mut Workflow, hld: &str, progress: bool) -> (Stage, String) {
    let pb = ux::spinner("Generating technical design", progress);
    let (next, res) = wf.submit_hld(hld).await;
    ux::finish(pb);
    ux::show_stage_result(&res);
    (next, res.display_text)
}

fn save_snapshot(wf: &mut Workflow) {
    match wf.save_snapshot() {
        Ok(p) => println!("{} {}", "Snapshot saved:".green().bold(), p.display()),
        Err(e) => println!("{} {}", "Snapshot not saved:".red().bold(), e),
    }
}
