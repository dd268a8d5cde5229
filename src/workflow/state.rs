use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single in-progress project. Serialized as-is into snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    pub project_name: String,
    pub requirements: String,
    pub hld: String,
    pub technical_design: String,
    pub timestamp: String,
}

impl ProjectState {
    pub fn touch(&mut self) {
        self.timestamp = Local::now().to_rfc3339();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Requirements,
    Hld,
    TechnicalDesign,
    CodeGeneration,
}

impl Stage {
    /// Where to pick up after restoring `state`.
    pub fn resume_point(state: &ProjectState) -> Stage {
        if !state.technical_design.trim().is_empty() {
            Stage::TechnicalDesign
        } else if !state.hld.trim().is_empty() {
            Stage::Hld
        } else {
            Stage::Requirements
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Requirements => "Requirements",
            Stage::Hld => "High-Level Design",
            Stage::TechnicalDesign => "Technical Design",
            Stage::CodeGeneration => "Code Generation",
        };
        f.write_str(s)
    }
}
