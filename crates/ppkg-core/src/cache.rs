//! Content-addressed download cache.
//!
//! Every cached artifact lives at `downloads/<sha256><ext>`, so the file
//! name commits to the content. Downloads land in a session-named temp file
//! first and only adopt the stable name after hash verification, which
//! keeps the invariant intact across crashes and aborted fetches.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::hash;
use crate::paths::{self, Paths};

/// Compound archive suffixes normalized to their short forms.
const COMPOUND_SUFFIXES: [(&str, &str); 4] = [
    (".tar.gz", ".tgz"),
    (".tar.xz", ".txz"),
    (".tar.lz", ".tlz"),
    (".tar.bz2", ".tbz2"),
];

#[derive(Debug)]
pub struct DownloadCache<'a> {
    paths: &'a Paths,
}

impl<'a> DownloadCache<'a> {
    pub fn new(paths: &'a Paths) -> Self {
        Self { paths }
    }

    /// Return a verified local copy of `url`, fetching it if the cache has
    /// no matching entry.
    ///
    /// `session_id` names the temp file; on [`Error::ShaMismatch`] the temp
    /// file is retained for diagnostics and the stable name is never
    /// created.
    pub fn fetch(
        &self,
        url: &str,
        expected_sha: &str,
        extension: &str,
        session_id: &str,
    ) -> Result<PathBuf> {
        let downloads = self.paths.downloads_dir();
        paths::ensure_dir(&downloads)?;

        let target = downloads.join(format!("{expected_sha}{extension}"));
        if entry_matches(&target, expected_sha)? {
            info!("{} already have been fetched.", target.display());
            return Ok(target);
        }

        let tmp = downloads.join(session_id);
        http_fetch_to_file(url, &tmp)?;

        let actual = hash::sha256_of_file(&tmp)?;
        if actual != expected_sha {
            return Err(Error::ShaMismatch {
                expected: expected_sha.to_string(),
                actual,
            });
        }

        fs::rename(&tmp, &target).map_err(|e| Error::io(&target, e))?;
        info!("{}", target.display());
        Ok(target)
    }
}

/// Probe a cache entry. A stat failure means "absent"; an entry whose
/// contents no longer hash to its name is also treated as absent.
fn entry_matches(path: &Path, expected_sha: &str) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(md) if md.is_file() => Ok(hash::sha256_of_file(path)? == expected_sha),
        _ => Ok(false),
    }
}

fn http_fetch_to_file(url: &str, dest: &Path) -> Result<()> {
    debug!(url, dest = %dest.display(), "fetching");

    let response = reqwest::blocking::Client::new()
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Network {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let mut file = File::create(dest).map_err(|e| Error::io(dest, e))?;
    let mut body = response;
    io::copy(&mut body, &mut file).map_err(|e| Error::io(dest, e))?;
    Ok(())
}

/// Derive the cache-name extension from the artifact URL.
///
/// Compound tar suffixes collapse to their short forms; otherwise the last
/// `.ext` of the final path segment is used; a bare name yields an empty
/// extension.
pub fn file_extension_from_url(url: &str) -> String {
    let name = url.rsplit('/').next().unwrap_or(url);
    let name = name.split(['?', '#']).next().unwrap_or(name);

    for (suffix, short) in COMPOUND_SUFFIXES {
        if name.ends_with(suffix) {
            return short.to_string();
        }
    }

    match name.rfind('.') {
        Some(i) if i > 0 => name[i..].to_string(),
        _ => String::new(),
    }
}
