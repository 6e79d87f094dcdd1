//! Home-directory layout and per-process session workspace.
//!
//! All on-disk state lives under one home directory:
//!
//! ```text
//! ~/.ppkg/
//!   repos.d/     registered formula repositories
//!   downloads/   content-addressed artifact cache
//!   installed/   install roots and stable package links
//!   run/<pid>/   per-invocation scratch space
//! ```
//!
//! The home directory must sit on a single filesystem: repo add and cache
//! promotion rely on `rename(2)` staying atomic.

use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resolved home-directory layout, constructed once at the entry point and
/// passed down explicitly.
#[derive(Debug, Clone)]
pub struct Paths {
    home: PathBuf,
    pid: u32,
}

impl Paths {
    /// Resolve the home directory (`$PPKG_HOME`, else `~/.ppkg`) and make
    /// sure it exists.
    pub fn resolve() -> Result<Self> {
        let home = match std::env::var_os("PPKG_HOME") {
            Some(v) if !v.is_empty() => PathBuf::from(v),
            _ => dirs::home_dir()
                .ok_or_else(|| {
                    Error::ArgInvalid(
                        "cannot determine the home directory; set PPKG_HOME".to_string(),
                    )
                })?
                .join(".ppkg"),
        };
        Self::with_home(home)
    }

    /// Use an explicit home directory, creating it if needed.
    pub fn with_home(home: impl Into<PathBuf>) -> Result<Self> {
        let home = home.into();
        match fs::metadata(&home) {
            Ok(md) if md.is_dir() => {}
            Ok(_) => {
                return Err(Error::io(
                    &home,
                    io::Error::other("expected a directory"),
                ));
            }
            Err(_) => {
                fs::DirBuilder::new()
                    .recursive(true)
                    .mode(0o700)
                    .create(&home)
                    .map_err(|e| Error::io(&home, e))?;
            }
        }
        Ok(Self {
            home,
            pid: std::process::id(),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// `repos.d/` - registered formula repositories.
    pub fn repos_dir(&self) -> PathBuf {
        self.home.join("repos.d")
    }

    /// `downloads/` - the content-addressed cache.
    pub fn downloads_dir(&self) -> PathBuf {
        self.home.join("downloads")
    }

    /// `installed/` - install roots plus stable package links.
    pub fn installed_dir(&self) -> PathBuf {
        self.home.join("installed")
    }

    /// `run/` - parent of all session directories.
    pub fn run_dir(&self) -> PathBuf {
        self.home.join("run")
    }

    /// `run/<pid>/` - this invocation's scratch directory.
    pub fn session_dir(&self) -> PathBuf {
        self.run_dir().join(self.pid.to_string())
    }

    /// Guarantee `run/<pid>/` exists and is empty.
    ///
    /// A leftover directory from a previous process with the same pid is
    /// recursively removed; a non-directory squatting on the path is
    /// unlinked.
    pub fn prepare_session(&self) -> Result<PathBuf> {
        ensure_dir(&self.run_dir())?;

        let session = self.session_dir();
        match fs::symlink_metadata(&session) {
            Ok(md) if md.is_dir() => {
                fs::remove_dir_all(&session).map_err(|e| Error::io(&session, e))?;
            }
            Ok(_) => {
                fs::remove_file(&session).map_err(|e| Error::io(&session, e))?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&session, e)),
        }

        fs::DirBuilder::new()
            .mode(0o700)
            .create(&session)
            .map_err(|e| Error::io(&session, e))?;
        Ok(session)
    }
}

/// Idempotent directory creation with mode `0700`.
///
/// A non-directory at `path` is unlinked first. A concurrent `mkdir` racing
/// us (`EEXIST`) is treated as success.
pub fn ensure_dir(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(md) if md.is_dir() => return Ok(()),
        Ok(_) => fs::remove_file(path).map_err(|e| Error::io(path, e))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(path, e)),
    }

    match fs::DirBuilder::new().mode(0o700).create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in_temp() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_home(dir.path().join(".ppkg")).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_with_home_creates_the_directory() {
        let (_tmp, paths) = paths_in_temp();
        assert!(paths.home().is_dir());
    }

    #[test]
    fn test_layout() {
        let (_tmp, paths) = paths_in_temp();
        assert!(paths.repos_dir().ends_with("repos.d"));
        assert!(paths.downloads_dir().ends_with("downloads"));
        assert!(paths.installed_dir().ends_with("installed"));
        assert_eq!(
            paths.session_dir(),
            paths.run_dir().join(std::process::id().to_string())
        );
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let (_tmp, paths) = paths_in_temp();
        let dir = paths.home().join("sub");
        ensure_dir(&dir).unwrap();
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_replaces_a_file() {
        let (_tmp, paths) = paths_in_temp();
        let path = paths.home().join("squatter");
        fs::write(&path, "not a directory").unwrap();
        ensure_dir(&path).unwrap();
        assert!(path.is_dir());
    }

    #[test]
    fn test_prepare_session_empties_stale_state() {
        let (_tmp, paths) = paths_in_temp();
        let session = paths.prepare_session().unwrap();
        fs::write(session.join("stale"), "x").unwrap();

        let session = paths.prepare_session().unwrap();
        assert!(session.is_dir());
        assert_eq!(fs::read_dir(&session).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_session_unlinks_a_file() {
        let (_tmp, paths) = paths_in_temp();
        ensure_dir(&paths.run_dir()).unwrap();
        fs::write(paths.session_dir(), "squatter").unwrap();

        let session = paths.prepare_session().unwrap();
        assert!(session.is_dir());
    }
}
