use fs_err as fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::errors::{AssistantError, AssistantResult};
use crate::naming;
use crate::workflow::ProjectState;

/// Write `state` to `dir/sdlc_state_<timestamp>.json` via a temp file.
pub fn save(dir: &Path, state: &ProjectState) -> AssistantResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = naming::unique_path(dir, &format!("sdlc_state_{}", naming::timestamp()), "json");

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
    tmp.persist(&path).map_err(|e| AssistantError::Io(e.error))?;

    tracing::info!(path = %path.display(), "snapshot saved");
    Ok(path)
}

pub fn load(path: &Path) -> AssistantResult<ProjectState> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| AssistantError::Snapshot(format!("{}: {e}", path.display())))
}
