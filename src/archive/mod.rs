use fs_err as fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::{AssistantError, AssistantResult};
use crate::naming;
use crate::structure::{is_safe_relative, FileMap};

/// Materialize `files` in a scratch directory under `out_dir`, zip it to
/// `generated_code_<timestamp>.zip` and remove the scratch directory.
/// The scratch directory is removed on every path; a partial zip is too.
pub fn package(out_dir: &Path, files: &FileMap) -> AssistantResult<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let stem = format!("generated_code_{}", naming::timestamp());
    let work = tempfile::Builder::new().prefix(&format!("{stem}_")).tempdir_in(out_dir)?;

    materialize(work.path(), files)?;

    let zip_path = naming::unique_path(out_dir, &stem, "zip");
    zip_dir(work.path(), &zip_path)?;

    work.close()?;
    tracing::info!(archive = %zip_path.display(), files = files.len(), "project packaged");
    Ok(zip_path)
}

/// Write every entry below `root`, creating parent directories and
/// normalizing CRLF to LF.
pub fn materialize(root: &Path, files: &FileMap) -> AssistantResult<()> {
    for (rel, content) in files {
        if !is_safe_relative(rel) {
            return Err(AssistantError::Archive(format!("refusing to write outside project: {rel}")));
        }
        let abs = root.join(rel);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&abs, content.replace("\r\n", "\n"))?;
    }
    Ok(())
}

fn zip_dir(src: &Path, dest: &Path) -> AssistantResult<()> {
    let entries = WalkDir::new(src).sort_by_file_name().into_iter().filter_map(|entry| match entry {
        Ok(e) if e.file_type().is_file() => Some(entry_name(src, e.path()).map(|name| (name, e.into_path()))),
        Ok(_) => None,
        Err(e) => Some(Err(AssistantError::Archive(e.to_string()))),
    });
    write_zip(dest, entries)
}

/// Forward-slash archive name of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> AssistantResult<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| AssistantError::Archive(e.to_string()))?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Write `(name, source)` entries into `dest`. A partially written `dest`
/// is removed when any entry fails.
fn write_zip<I>(dest: &Path, entries: I) -> AssistantResult<()>
where
    I: IntoIterator<Item = AssistantResult<(String, PathBuf)>>,
{
    let result = write_entries(dest, entries);
    if result.is_err() && dest.exists() {
        let _ = fs::remove_file(dest);
    }
    result
}

fn write_entries<I>(dest: &Path, entries: I) -> AssistantResult<()>
where
    I: IntoIterator<Item = AssistantResult<(String, PathBuf)>>,
{
    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        let (name, path) = entry?;
        zip.start_file(name, options)?;
        zip.write_all(&fs::read(&path)?)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sample() -> FileMap {
        [
            ("CMakeLists.txt", "project(demo)\r\n"),
            ("include/demo.h", "#pragma once\n"),
            ("src/main.cpp", "int main() {\r\n  return 0;\r\n}\r\n"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn read_entry(zip_path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut s = String::new();
        entry.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn packages_every_file_and_cleans_up() {
        let out = tempfile::tempdir().unwrap();
        let zip_path = package(out.path(), &sample()).unwrap();

        assert!(zip_path.file_name().unwrap().to_string_lossy().starts_with("generated_code_"));
        let archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(read_entry(&zip_path, "src/main.cpp"), "int main() {\n  return 0;\n}\n");
        assert_eq!(read_entry(&zip_path, "include/demo.h"), "#pragma once\n");

        let left: Vec<_> = std::fs::read_dir(out.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(left, vec![zip_path]);
    }

    #[test]
    fn two_packages_in_the_same_second_do_not_collide() {
        let out = tempfile::tempdir().unwrap();
        let a = package(out.path(), &sample()).unwrap();
        let b = package(out.path(), &sample()).unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn failed_entry_removes_the_partial_zip() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("main.cpp");
        std::fs::write(&present, "int main() {}\n").unwrap();
        let dest = dir.path().join("generated_code_x.zip");

        let entries: Vec<AssistantResult<(String, PathBuf)>> = vec![
            Ok(("src/main.cpp".to_string(), present)),
            Ok(("src/gone.cpp".to_string(), dir.path().join("gone.cpp"))),
        ];
        let err = write_zip(&dest, entries).unwrap_err();

        assert!(matches!(err, AssistantError::Io(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn walk_error_removes_the_partial_zip() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("generated_code_y.zip");

        let entries: Vec<AssistantResult<(String, PathBuf)>> =
            vec![Err(AssistantError::Archive("directory vanished".into()))];
        let err = write_zip(&dest, entries).unwrap_err();

        assert!(matches!(err, AssistantError::Archive(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unsafe_path_fails_without_leftovers() {
        let out = tempfile::tempdir().unwrap();
        let mut files = sample();
        files.insert("../escape.txt".into(), "x".into());

        let err = package(out.path(), &files).unwrap_err();

        assert!(matches!(err, AssistantError::Archive(_)));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
        assert!(!out.path().parent().unwrap().join("escape.txt").exists());
    }
}
