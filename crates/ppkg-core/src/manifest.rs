//! Installed-file manifest recording.
//!
//! Format, one entry per line, paths relative to the install root:
//!
//! ```text
//! d|bin/
//! f|bin/jq
//! ```
//!
//! Directories are listed in depth-first pre-order ahead of their contents.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Metadata directory inside every install root.
pub const META_DIR: &str = ".uppm";

/// Manifest file name inside [`META_DIR`].
pub const MANIFEST_FILE: &str = "manifest.txt";

/// Walk `install_root` and write `.uppm/manifest.txt`.
///
/// The manifest file is created before the walk starts, so the manifest
/// lists itself. Entries are sorted by file name for deterministic output.
pub fn record(install_root: &Path) -> Result<PathBuf> {
    let manifest_path = install_root.join(META_DIR).join(MANIFEST_FILE);
    let file = File::create(&manifest_path).map_err(|e| Error::io(&manifest_path, e))?;
    let mut out = BufWriter::new(file);

    for entry in WalkDir::new(install_root)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map_or_else(|| install_root.to_path_buf(), Path::to_path_buf);
            Error::io(path, e.into())
        })?;

        let rel = entry
            .path()
            .strip_prefix(install_root)
            .expect("walked path is under the install root");

        if entry.file_type().is_dir() {
            writeln!(out, "d|{}/", rel.display()).map_err(|e| Error::io(&manifest_path, e))?;
        } else {
            writeln!(out, "f|{}", rel.display()).map_err(|e| Error::io(&manifest_path, e))?;
        }
    }

    out.flush().map_err(|e| Error::io(&manifest_path, e))?;
    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_record_lists_dirs_before_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(root.join(META_DIR)).unwrap();
        fs::write(root.join("bin/jq"), "x").unwrap();
        fs::write(root.join("README"), "x").unwrap();

        let path = record(root).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(
            lines,
            vec![
                "d|.uppm/",
                "f|.uppm/manifest.txt",
                "f|README",
                "d|bin/",
                "f|bin/jq",
            ]
        );
    }

    #[test]
    fn test_record_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(META_DIR)).unwrap();
        for name in ["zz", "aa", "mm"] {
            fs::write(root.join(name), "x").unwrap();
        }

        let first = fs::read_to_string(record(root).unwrap()).unwrap();
        let second = fs::read_to_string(record(root).unwrap()).unwrap();
        assert_eq!(first, second);

        let files: Vec<&str> = first
            .lines()
            .filter(|l| !l.contains(META_DIR))
            .collect();
        assert_eq!(files, vec!["f|aa", "f|mm", "f|zz"]);
    }

    #[test]
    fn test_paths_have_no_leading_slash() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(META_DIR)).unwrap();
        fs::write(root.join("file"), "x").unwrap();

        let content = fs::read_to_string(record(root).unwrap()).unwrap();
        for line in content.lines() {
            let (_, rest) = line.split_once('|').unwrap();
            assert!(!rest.starts_with('/'), "absolute path in manifest: {line}");
        }
    }
}
