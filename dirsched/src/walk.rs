use std::path::{Path, PathBuf};

use anyhow::Context;
use walkdir::WalkDir;

/// Enumerate the regular files under `root`, sorted by name per directory.
///
/// Directories and symlinks are skipped. Entries that cannot be read are
/// logged and skipped; only an unreadable `root` is an error.
pub fn regular_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::metadata(root)
        .with_context(|| format!("cannot read root {}", root.display()))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
            }
        }
    }

    tracing::debug!(root = %root.display(), files = files.len(), "walk finished");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_only_regular_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        std::fs::write(dir.path().join("b/nested/z.txt"), b"z").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"c").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            dir.path().join("a.txt"),
            dir.path().join("link.txt"),
        )
        .unwrap();

        let files = regular_files(dir.path()).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b/nested/z.txt"),
                PathBuf::from("c.txt"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(regular_files(&dir.path().join("missing")).is_err());
    }
}
