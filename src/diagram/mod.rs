//! Graphviz diagrams embedded in generated text.
//!
//! [`extract`] is pure: it finds fenced `dot` blocks and strips them.
//! [`DiagramRenderer`] is the side-effecting half that turns a source into
//! an image file.

use fs_err as fs;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::errors::{AssistantError, AssistantResult};
use crate::{exec, naming};

static DIAGRAM_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:dot|graphviz)\b(.*?)```").expect("diagram fence pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    /// Interior of the first diagram fence.
    pub source: Option<String>,
    /// Further diagram fences that were stripped but will not be rendered.
    pub extra_blocks: usize,
}

pub fn extract(text: &str) -> Extracted {
    let mut blocks = DIAGRAM_FENCE.captures_iter(text);
    let Some(first) = blocks.next() else {
        return Extracted { text: text.to_string(), source: None, extra_blocks: 0 };
    };
    let source = first.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
    let extra_blocks = blocks.count();

    Extracted {
        text: DIAGRAM_FENCE.replace_all(text, "").trim().to_string(),
        source: Some(source),
        extra_blocks,
    }
}

#[derive(Debug, Clone)]
pub struct DiagramRenderer {
    pub program: String,
    pub format: String,
    pub out_dir: PathBuf,
}

impl DiagramRenderer {
    pub fn new(program: impl Into<String>, format: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), format: format.into(), out_dir: out_dir.into() }
    }

    /// Render into a temp file first; only a successful render gets a
    /// `graph_<timestamp>.<format>` name.
    pub fn render(&self, source: &str) -> AssistantResult<PathBuf> {
        fs::create_dir_all(&self.out_dir)?;
        let tmp = tempfile::Builder::new()
            .prefix(".graph_")
            .suffix(&format!(".{}", self.format))
            .tempfile_in(&self.out_dir)?;
        let tmp_path = tmp.path().to_string_lossy().to_string();
        let type_flag = format!("-T{}", self.format);

        let res = exec::run_tool(&self.program, &[&type_flag, "-o", &tmp_path], source)?;
        if !res.success() {
            let detail = if res.stderr.trim().is_empty() { &res.stdout } else { &res.stderr };
            return Err(AssistantError::Render(format!(
                "{} exited with {}: {}",
                self.program,
                res.status,
                detail.trim()
            )));
        }

        let target = naming::unique_path(&self.out_dir, &format!("graph_{}", naming::timestamp()), &self.format);
        tmp.persist(&target).map_err(|e| AssistantError::Io(e.error))?;
        tracing::info!(path = %target.display(), "diagram rendered");
        Ok(target)
    }
}
