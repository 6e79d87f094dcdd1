//! Child-process launcher shared by the git, graph-rendering, and
//! install-script spawn sites.

use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Command;

/// How a joined child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Exited(i32),
    Signaled(i32),
    Stopped(i32),
}

impl ProcessStatus {
    pub fn success(self) -> bool {
        matches!(self, ProcessStatus::Exited(0))
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Exited(code) => write!(f, "exit with status code: {code}"),
            ProcessStatus::Signaled(sig) => write!(f, "killed by signal: {sig}"),
            ProcessStatus::Stopped(sig) => write!(f, "stopped by signal: {sig}"),
        }
    }
}

impl From<std::process::ExitStatus> for ProcessStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            ProcessStatus::Exited(code)
        } else if let Some(sig) = status.signal() {
            ProcessStatus::Signaled(sig)
        } else if let Some(sig) = status.stopped_signal() {
            ProcessStatus::Stopped(sig)
        } else {
            // On unix a joined child always has a code or a signal.
            ProcessStatus::Exited(-1)
        }
    }
}

/// Spawn `program` with `args`, optionally in `cwd`, inheriting stdio, and
/// wait for it to terminate.
pub fn spawn_and_wait<S, I>(
    program: impl AsRef<OsStr>,
    args: I,
    cwd: Option<&Path>,
) -> io::Result<ProcessStatus>
where
    S: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    Ok(cmd.status()?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_zero() {
        let status = spawn_and_wait("/bin/sh", ["-c", "exit 0"], None).unwrap();
        assert_eq!(status, ProcessStatus::Exited(0));
        assert!(status.success());
    }

    #[test]
    fn test_nonzero_exit_code_is_reported() {
        let status = spawn_and_wait("/bin/sh", ["-c", "exit 3"], None).unwrap();
        assert_eq!(status, ProcessStatus::Exited(3));
        assert!(!status.success());
    }

    #[test]
    fn test_cwd_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let status = spawn_and_wait("/bin/sh", ["-c", "touch here"], Some(dir.path())).unwrap();
        assert!(status.success());
        assert!(dir.path().join("here").exists());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            ProcessStatus::Exited(2).to_string(),
            "exit with status code: 2"
        );
        assert_eq!(ProcessStatus::Signaled(9).to_string(), "killed by signal: 9");
    }
}
