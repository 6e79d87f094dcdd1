//! Error taxonomy shared across the core.
//!
//! Every failure the pipeline can produce maps to a distinct exit code in
//! the 1-255 range via [`Error::exit_code`]; the CLI performs the final
//! translation.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::process::ProcessStatus;

/// Exit codes for network failures start here; the HTTP status is added on.
pub const NETWORK_EXIT_BASE: i32 = 100;

/// Exit code reserved for archive extraction failures.
pub const ARCHIVE_EXIT_BASE: i32 = 60;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    ArgInvalid(String),

    #[error("no enabled formula repo provides package '{0}'")]
    FormulaNotFound(String),

    #[error("malformed formula {path}: {detail}")]
    FormulaParse { path: PathBuf, detail: String },

    #[error("malformed repo config {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("package '{0}' depends on itself")]
    SelfDependency(String),

    #[error("sha256sum mismatch.\n    expect : {expected}\n    actual : {actual}")]
    ShaMismatch { expected: String, actual: String },

    #[error("formula repo '{0}' already exists")]
    RepoAlreadyExists(String),

    #[error("formula repo '{0}' is not registered")]
    RepoNotFound(String),

    #[error("http request for {url} failed with status {status}")]
    Network { url: String, status: u16 },

    #[error("http transport failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extracting {path} failed: {detail}")]
    Archive { path: PathBuf, detail: String },

    #[error("install script of package '{package}' {status}")]
    InstallScriptFailed {
        package: String,
        status: ProcessStatus,
    },

    #[error("running '{program}' {status}")]
    Subprocess {
        program: String,
        status: ProcessStatus,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Attach the path a syscall failed on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Map this error onto the process exit code contract.
    ///
    /// Network errors carry the HTTP status offset by [`NETWORK_EXIT_BASE`],
    /// clamped to the exit-code range.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ArgInvalid(_) => 1,
            Error::FormulaNotFound(_) => 2,
            Error::FormulaParse { .. } => 3,
            Error::ConfigParse { .. } => 4,
            Error::SelfDependency(_) => 5,
            Error::ShaMismatch { .. } => 6,
            Error::RepoAlreadyExists(_) => 7,
            Error::RepoNotFound(_) => 8,
            Error::InstallScriptFailed { .. } => 9,
            Error::Subprocess { .. } => 10,
            Error::Io { .. } => 11,
            Error::Archive { .. } => ARCHIVE_EXIT_BASE,
            Error::Http(_) => NETWORK_EXIT_BASE,
            Error::Network { status, .. } => (NETWORK_EXIT_BASE + i32::from(*status)).min(255),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            Error::ArgInvalid(String::new()),
            Error::FormulaNotFound(String::new()),
            Error::FormulaParse {
                path: PathBuf::new(),
                detail: String::new(),
            },
            Error::ConfigParse {
                path: PathBuf::new(),
                detail: String::new(),
            },
            Error::SelfDependency(String::new()),
            Error::ShaMismatch {
                expected: String::new(),
                actual: String::new(),
            },
            Error::RepoAlreadyExists(String::new()),
            Error::RepoNotFound(String::new()),
            Error::InstallScriptFailed {
                package: String::new(),
                status: ProcessStatus::Exited(1),
            },
            Error::Subprocess {
                program: String::new(),
                status: ProcessStatus::Exited(1),
            },
            Error::Io {
                path: PathBuf::new(),
                source: io::Error::other("x"),
            },
            Error::Archive {
                path: PathBuf::new(),
                detail: String::new(),
            },
        ];

        let mut codes: Vec<i32> = errors.iter().map(Error::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| (1..=255).contains(c)));
    }

    #[test]
    fn test_network_exit_code_is_clamped() {
        let err = Error::Network {
            url: "http://example.com".into(),
            status: 503,
        };
        assert_eq!(err.exit_code(), 255);
    }
}
