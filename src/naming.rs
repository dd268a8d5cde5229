use chrono::Local;
use std::path::{Path, PathBuf};

/// `YYYYmmdd_HHMMSS` in local time, used in every generated file name.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `dir/stem.ext`, or `dir/stem_N.ext` for the first N that is free.
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{ext}"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
