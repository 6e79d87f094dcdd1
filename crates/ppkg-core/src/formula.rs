//! YAML formula parsing.
//!
//! A formula describes exactly one installable package version. Formulas
//! pin a single prebuilt artifact by URL and SHA-256; there is no
//! version-constraint solving.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

/// One package version, as loaded from a repo's `formula/<name>.yml`.
#[derive(Debug, Clone)]
pub struct Formula {
    pub summary: Option<String>,
    pub webpage: Option<String>,
    pub version: Option<String>,
    /// URL of the prebuilt binary artifact.
    pub bin_url: String,
    /// Lowercase hex SHA-256 of the artifact bytes.
    pub bin_sha: String,
    /// Whitespace-separated runtime dependency names.
    pub dep_pkg: Option<String>,
    /// Relative subdirectory to extract the archive into.
    pub unpackd: Option<String>,
    /// Shell script body executed after extraction.
    pub install: Option<String>,
    /// Absolute path of the formula file on disk.
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FormulaDoc {
    summary: Option<String>,
    webpage: Option<String>,
    version: Option<String>,
    bin_url: Option<String>,
    bin_sha: Option<String>,
    dep_pkg: Option<String>,
    unpackd: Option<String>,
    install: Option<String>,
    /// Per-platform overrides of the artifact fields.
    #[serde(default)]
    platforms: HashMap<String, PlatformOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PlatformOverride {
    bin_url: Option<String>,
    bin_sha: Option<String>,
    dep_pkg: Option<String>,
    unpackd: Option<String>,
    install: Option<String>,
}

impl Formula {
    /// Parse the formula at `path`, applying the `platforms` override entry
    /// for `target_platform` over the top-level fields when present.
    pub fn load(path: &Path, target_platform: Option<&str>) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut doc: FormulaDoc =
            serde_yaml::from_str(&content).map_err(|e| Error::FormulaParse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        if let Some(platform) = target_platform
            && let Some(over) = doc.platforms.remove(platform)
        {
            doc.bin_url = over.bin_url.or(doc.bin_url);
            doc.bin_sha = over.bin_sha.or(doc.bin_sha);
            doc.dep_pkg = over.dep_pkg.or(doc.dep_pkg);
            doc.unpackd = over.unpackd.or(doc.unpackd);
            doc.install = over.install.or(doc.install);
        }

        let parse_err = |detail: &str| Error::FormulaParse {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        };

        let bin_url = doc
            .bin_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| parse_err("missing required field 'bin-url'"))?;
        let bin_sha = doc
            .bin_sha
            .ok_or_else(|| parse_err("missing required field 'bin-sha'"))?;
        if bin_sha.len() != 64 || !bin_sha.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(parse_err(
                "field 'bin-sha' must be 64 lowercase hexadecimal characters",
            ));
        }

        Ok(Formula {
            summary: doc.summary,
            webpage: doc.webpage,
            version: doc.version,
            bin_url,
            bin_sha,
            dep_pkg: doc.dep_pkg,
            unpackd: doc.unpackd,
            install: doc.install,
            path: path.to_path_buf(),
        })
    }

    /// Dependency names in declaration order. Empty or absent `dep-pkg`
    /// yields nothing.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dep_pkg
            .as_deref()
            .unwrap_or("")
            .split(' ')
            .filter(|d| !d.is_empty())
    }
}

static NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Validate a package identifier: non-empty, `[A-Za-z0-9._+-]+`,
/// case-sensitive.
pub fn validate_package_name(name: &str) -> Result<()> {
    let re = NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._+-]+$").expect("valid regex"));
    if re.is_match(name) {
        Ok(())
    } else {
        Err(Error::ArgInvalid(format!("invalid package name '{name}'")))
    }
}
