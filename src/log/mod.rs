use crate::wire::{ChatRecord, ChatRequest, Outcome};
use chrono::Utc;
use fs_err as fs;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct SavedPaths {
    pub request: PathBuf,
    pub response: PathBuf,
}

/// Where one session's request/response pairs are kept.
#[derive(Debug, Clone)]
pub struct Transcript {
    session: Uuid,
    dir: PathBuf,
}

fn tx_dir(root: &Path, tx: Uuid) -> PathBuf {
    root.join(".sdlc").join("tx").join(tx.to_string())
}

impl Transcript {
    pub fn new(out_dir: &Path, session: Uuid) -> Self {
        Self { session, dir: tx_dir(out_dir, session) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_stage(
        &self,
        stage: &str,
        req: &ChatRequest,
        outcome: Outcome,
        text: &str,
    ) -> anyhow::Result<SavedPaths> {
        fs::create_dir_all(&self.dir)?;

        let record = ChatRecord {
            session: self.session,
            stage: stage.to_string(),
            timestamp: Utc::now(),
            outcome,
            text: text.to_string(),
        };

        let request = self.dir.join(format!("{stage}.request.json"));
        fs::write(&request, to_string_pretty(req)?)?;
        let response = self.dir.join(format!("{stage}.response.json"));
        fs::write(&response, to_string_pretty(&record)?)?;

        Ok(SavedPaths { request, response })
    }
}
