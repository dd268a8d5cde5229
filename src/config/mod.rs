use anyhow::{Context, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::{Args, ProviderKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderKind,
    pub model: String,
    /// Provider base URL; `None` picks the provider's public endpoint.
    pub api_base: Option<String>,
    pub anthropic_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// No timeout unless set; the transport default applies.
    pub timeout_secs: Option<u64>,
    pub out_dir: PathBuf,
    pub dot_program: String,
    pub diagram_format: String,
    pub save_transcripts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            model: "gpt-4o-mini".into(),
            api_base: None,
            anthropic_version: "2023-06-01".into(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: None,
            out_dir: PathBuf::from("."),
            dot_program: "dot".into(),
            diagram_format: "svg".into(),
            save_transcripts: false,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then environment, then flags.
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut cfg = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let env = |key: &str| std::env::var(key).ok();
        cfg.apply_env(env);
        cfg.apply_args(args);
        // base URL follows the final provider choice
        cfg.apply_base_env(env);
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(p) = set("SDLC_PROVIDER") {
            match p.to_lowercase().as_str() {
                "openai" | "open-ai" => self.provider = ProviderKind::OpenAI,
                "anthropic" => self.provider = ProviderKind::Anthropic,
                "ollama" => self.provider = ProviderKind::Ollama,
                other => tracing::warn!(provider = other, "ignoring unknown SDLC_PROVIDER"),
            }
        }
        if let Some(m) = set("OPENAI_MODEL") {
            self.model = m;
        }
        if let Some(d) = set("SDLC_OUT_DIR") {
            self.out_dir = PathBuf::from(d);
        }
        if let Some(d) = set("SDLC_DOT") {
            self.dot_program = d;
        }
    }

    fn apply_base_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = match self.provider {
            ProviderKind::OpenAI => "OPENAI_BASE_URL",
            ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
            ProviderKind::Ollama => "OLLAMA_URL",
        };
        if let Some(b) = var(key).filter(|v| !v.trim().is_empty()) {
            self.api_base = Some(b);
        }
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(p) = args.provider {
            self.provider = p;
        }
        if let Some(m) = &args.model {
            self.model = m.clone();
        }
        if let Some(d) = &args.out_dir {
            self.out_dir = d.clone();
        }
        if args.save_transcripts {
            self.save_transcripts = true;
        }
    }
}
