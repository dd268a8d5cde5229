//! Workflow controller: owns the one live [`ProjectState`] and moves it
//! through Requirements → HLD → Technical Design → Code Generation.
//!
//! Nothing here fails loudly. Remote failures, unreadable code payloads,
//! bad snapshots and packaging errors all come back as values that say
//! they are degraded.

mod state;

pub use state::{ProjectState, Stage};

use std::path::{Path, PathBuf};

use crate::archive;
use crate::completion::{Completion, CompletionClient};
use crate::diagram::{self, DiagramRenderer};
use crate::snapshot;
use crate::stages;
use crate::structure::{self, CodeStructure, FallbackReason, FileMap};

pub const LOAD_ERROR_SENTINEL: &str = "Error loading state";

/// What a generating stage hands back for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub display_text: String,
    pub diagram: Option<PathBuf>,
    /// Diagram fences beyond the first; stripped, not rendered.
    pub extra_diagrams: usize,
    pub diagram_error: Option<String>,
    /// The completion failed and `display_text` is the error message.
    pub degraded: bool,
}

impl StageResult {
    /// Empty string when there is no diagram.
    pub fn diagram_path(&self) -> String {
        self.diagram.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Generated,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    Packaged {
        archive: PathBuf,
        files: Vec<String>,
        preview: String,
        origin: Origin,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLoad {
    Restored {
        requirements: String,
        hld: String,
        technical_design: String,
    },
    Failed {
        reason: String,
    },
}

impl SnapshotLoad {
    /// (requirements, hld, technical_design); the sentinel triple on failure.
    pub fn fields(&self) -> (&str, &str, &str) {
        match self {
            SnapshotLoad::Restored { requirements, hld, technical_design } => (requirements, hld, technical_design),
            SnapshotLoad::Failed { .. } => (LOAD_ERROR_SENTINEL, "", ""),
        }
    }
}

pub struct Workflow {
    client: CompletionClient,
    renderer: DiagramRenderer,
    out_dir: PathBuf,
    state: ProjectState,
    stage: Stage,
    current_structure: FileMap,
}

impl Workflow {
    pub fn new(client: CompletionClient, renderer: DiagramRenderer, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            renderer,
            out_dir: out_dir.into(),
            state: ProjectState::default(),
            stage: Stage::Requirements,
            current_structure: FileMap::new(),
        }
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn files(&self) -> &FileMap {
        &self.current_structure
    }

    /// Review the requirements text without moving the workflow.
    pub async fn refine_requirements(&mut self, requirements: &str) -> StageResult {
        let completion = stages::review_requirements(&self.client, requirements).await;
        self.present(completion)
    }

    pub async fn submit_requirements(&mut self, project_name: &str, requirements: &str) -> (Stage, StageResult) {
        self.state.project_name = project_name.to_string();
        self.state.requirements = requirements.to_string();
        self.state.technical_design.clear();
        self.current_structure.clear();

        let completion = stages::generate_hld(&self.client, requirements).await;
        self.state.hld = completion.text().to_string();
        self.state.touch();

        let result = self.present(completion);
        self.advance_to(Stage::Hld);
        (self.stage, result)
    }

    pub async fn submit_hld(&mut self, hld: &str) -> (Stage, StageResult) {
        self.state.hld = hld.to_string();
        self.current_structure.clear();

        let completion = stages::generate_technical_design(&self.client, hld).await;
        self.state.technical_design = completion.text().to_string();
        self.state.touch();

        let result = self.present(completion);
        self.advance_to(Stage::TechnicalDesign);
        (self.stage, result)
    }

    pub fn submit_technical_design(&mut self, technical_design: &str) -> Stage {
        self.state.technical_design = technical_design.to_string();
        self.current_structure.clear();
        self.state.touch();
        self.advance_to(Stage::CodeGeneration);
        self.stage
    }

    pub async fn generate_code(&mut self) -> CodeOutcome {
        let completion = stages::generate_code_structure(&self.client, &self.state.technical_design).await;
        let structure = match completion {
            Completion::Failed(msg) => CodeStructure::fallback(FallbackReason::CompletionFailed(msg)),
            Completion::Generated(text) => structure::to_file_map(&text),
        };

        let origin = match &structure {
            CodeStructure::Parsed(_) => Origin::Generated,
            CodeStructure::Fallback { reason, .. } => Origin::Fallback(reason.clone()),
        };
        let files = structure.into_files();

        match archive::package(&self.out_dir, &files) {
            Ok(archive) => {
                let preview = match &origin {
                    Origin::Generated => String::new(),
                    Origin::Fallback(reason) => {
                        format!("Generated code was replaced by the built-in example project: {reason}")
                    }
                };
                let keys = files.keys().cloned().collect();
                self.current_structure = files;
                CodeOutcome::Packaged { archive, files: keys, preview, origin }
            }
            Err(e) => {
                tracing::error!(error = %e, "packaging generated code failed");
                self.current_structure.clear();
                CodeOutcome::Failed { message: format!("Failed to package generated code: {e}") }
            }
        }
    }

    /// Content of one generated file; empty for unknown keys.
    pub fn preview(&self, file_key: &str) -> String {
        self.current_structure.get(file_key).cloned().unwrap_or_default()
    }

    pub fn save_snapshot(&mut self) -> crate::errors::AssistantResult<PathBuf> {
        self.state.touch();
        snapshot::save(&self.out_dir, &self.state)
    }

    pub fn load_snapshot(&mut self, path: &Path) -> SnapshotLoad {
        match snapshot::load(path) {
            Ok(state) => {
                self.stage = Stage::resume_point(&state);
                self.current_structure.clear();
                self.state = state;
                tracing::info!(path = %path.display(), stage = %self.stage, "snapshot restored");
                SnapshotLoad::Restored {
                    requirements: self.state.requirements.clone(),
                    hld: self.state.hld.clone(),
                    technical_design: self.state.technical_design.clone(),
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "snapshot load failed");
                SnapshotLoad::Failed { reason: e.to_string() }
            }
        }
    }

    fn advance_to(&mut self, stage: Stage) {
        tracing::info!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }

    fn present(&self, completion: Completion) -> StageResult {
        let degraded = completion.is_failure();
        let extracted = diagram::extract(completion.text());
        if extracted.extra_blocks > 0 {
            tracing::warn!(ignored = extracted.extra_blocks, "only the first diagram is rendered");
        }

        let (diagram, diagram_error) = match &extracted.source {
            Some(source) => match self.renderer.render(source) {
                Ok(path) => (Some(path), None),
                Err(e) => {
                    tracing::warn!(error = %e, "diagram not rendered");
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        StageResult {
            display_text: extracted.text,
            diagram,
            extra_diagrams: extracted.extra_blocks,
            diagram_error,
            degraded,
        }
    }
}
