use anyhow::{bail, Context, Result};
use colored::Colorize;
use fs_err as fs;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::process::Command;
use std::time::Duration;

use crate::workflow::{CodeOutcome, Origin, Stage, StageResult, Workflow};

pub fn banner(stage: Stage) {
    let title = format!(" [{}/4] {} ", stage.index() + 1, stage);
    println!("\n{}", format!("━━━━━━━━━━━━━━━━{title}━━━━━━━━━━━━━━━━").bold());
}

pub fn show_stage_result(res: &StageResult) {
    if res.degraded {
        println!("{}", "The model request failed; showing the error instead of a design.".red().bold());
    }
    println!("\n{}\n", res.display_text);
    let diagram = res.diagram_path();
    if !diagram.is_empty() {
        println!("{} {}", "Diagram:".cyan().bold(), diagram);
    } else if let Some(e) = &res.diagram_error {
        println!("{} {}", "Diagram not rendered:".yellow().bold(), e);
    }
    if res.extra_diagrams > 0 {
        println!(
            "{}",
            format!("({} additional diagram block(s) were removed and not rendered)", res.extra_diagrams).dimmed()
        );
    }
}

/// The restored text the user is about to accept or edit at `stage`.
pub fn resume_text<'a>(stage: Stage, hld: &'a str, technical: &'a str) -> Option<&'a str> {
    match stage {
        Stage::Hld => Some(hld),
        Stage::TechnicalDesign => Some(technical),
        Stage::Requirements | Stage::CodeGeneration => None,
    }
}

pub fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    let _ = io::stdout().flush();
    let mut s = String::new();
    if io::stdin().read_line(&mut s).is_ok() {
        let ans = s.trim().to_lowercase();
        ans == "y" || ans == "yes"
    } else {
        false
    }
}

pub fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label.bold());
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Accept,
    Edit,
    Regenerate,
    Save,
    Quit,
}

pub fn parse_choice(input: &str) -> Option<Choice> {
    match input.trim().to_lowercase().as_str() {
        "" | "a" | "accept" => Some(Choice::Accept),
        "e" | "edit" => Some(Choice::Edit),
        "r" | "regenerate" => Some(Choice::Regenerate),
        "s" | "save" => Some(Choice::Save),
        "q" | "quit" => Some(Choice::Quit),
        _ => None,
    }
}

pub fn choose() -> Result<Choice> {
    loop {
        let ans = prompt_line("[a]ccept  [e]dit  [r]egenerate  [s]ave snapshot  [q]uit")?;
        if let Some(c) = parse_choice(&ans) {
            return Ok(c);
        }
        println!("{}", "unrecognised choice".yellow());
    }
}

/// Edit `initial` in `$VISUAL`/`$EDITOR`; without one, read stdin until a lone `.`.
pub fn edit_text(initial: &str) -> Result<String> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()
        .filter(|e| !e.trim().is_empty());

    let Some(editor) = editor else {
        println!("{}", "Enter text; finish with a line containing only '.'".dimmed());
        return read_until_dot(io::stdin().lock());
    };

    let tmp = tempfile::Builder::new().prefix("sdlc_edit_").suffix(".md").tempfile()?;
    fs::write(tmp.path(), initial)?;

    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    let status = Command::new(program)
        .args(parts)
        .arg(tmp.path())
        .status()
        .with_context(|| format!("failed to launch editor {editor}"))?;
    if !status.success() {
        bail!("editor {editor} exited with {status}");
    }
    Ok(fs::read_to_string(tmp.path())?)
}

pub fn read_until_dot<R: BufRead>(reader: R) -> Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim_end() == "." {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub fn spinner(message: &str, enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

pub fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

pub fn print_code_dashboard(outcome: &CodeOutcome) {
    println!(
        "\n{}",
        "┏━━━━━━━━━━━━━━━━━━━━━━ Generated Code ━━━━━━━━━━━━━━━━━━━━━━┓".bold()
    );
    match outcome {
        CodeOutcome::Packaged { archive, files, preview, origin } => {
            let size = fs::metadata(archive).map(|m| format_size(m.len(), DECIMAL)).unwrap_or_default();
            println!("  {}: {}  {}", "Archive".green().bold(), archive.display(), size.dimmed());
            match origin {
                Origin::Generated => println!("  {}: {}", "Source".bold(), "generated".green()),
                Origin::Fallback(_) => println!("  {}: {}", "Source".bold(), "fallback example".yellow().bold()),
            }
            if !preview.is_empty() {
                println!("  {}", preview.yellow());
            }
            for (i, f) in files.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, f);
            }
        }
        CodeOutcome::Failed { message } => {
            println!("  {}", message.red().bold());
        }
    }
    println!("{}", "┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛".bold());
}

/// Let the user print generated files by number until they enter nothing.
pub fn preview_loop(wf: &Workflow) -> Result<()> {
    let keys: Vec<String> = wf.files().keys().cloned().collect();
    if keys.is_empty() {
        return Ok(());
    }
    loop {
        let ans = prompt_line("Preview file # (enter to finish)")?;
        if ans.is_empty() {
            return Ok(());
        }
        match ans.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| keys.get(i)) {
            Some(key) => {
                println!("\n{}\n{}", format!("── {key} ──").cyan().bold(), wf.preview(key));
            }
            None => println!("{}", "no such file".yellow()),
        }
    }
}
