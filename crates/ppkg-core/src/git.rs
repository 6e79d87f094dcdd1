//! Git synchronization through the system `git` executable.
//!
//! The core owns no git logic. The contract is: after [`sync`] returns,
//! the work tree at `dir` reflects `refs/remotes/origin/<branch>` of `url`.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::process;

/// Fetch `url` into `dir` and check out `branch`.
///
/// `remote_ref` is `refs/heads/<branch>`, `tracking_ref` is
/// `refs/remotes/origin/<branch>`; the pair forms the fetch refspec.
/// Works on an empty directory and on an existing clone alike.
pub fn sync(
    dir: &Path,
    url: &str,
    remote_ref: &str,
    tracking_ref: &str,
    branch: &str,
) -> Result<()> {
    let git = which::which("git").map_err(|_| {
        Error::io(
            Path::new("git"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "executable not found in PATH"),
        )
    })?;

    debug!(dir = %dir.display(), url, branch, "syncing formula repo");

    let dir_arg = dir.to_string_lossy();
    let refspec = format!("+{remote_ref}:{tracking_ref}");

    run(&git, &["init", "-q", dir_arg.as_ref()])?;
    run(&git, &["-C", dir_arg.as_ref(), "config", "remote.origin.url", url])?;
    run(&git, &["-C", dir_arg.as_ref(), "fetch", "-q", "origin", refspec.as_str()])?;
    run(
        &git,
        &["-C", dir_arg.as_ref(), "checkout", "-q", "-B", branch, tracking_ref],
    )?;

    Ok(())
}

fn run(git: &Path, args: &[&str]) -> Result<()> {
    let status = process::spawn_and_wait(git, args.iter().copied(), None)
        .map_err(|e| Error::io(git, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::Subprocess {
            program: "git".to_string(),
            status,
        })
    }
}
