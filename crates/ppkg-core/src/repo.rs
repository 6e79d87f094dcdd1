//! Formula repository registry: atomic add, in-place sync, enumeration.
//!
//! A registered repo is a directory `repos.d/<name>/` holding a git clone
//! plus a config file. The registry's essential invariant: `repos.d/<name>`
//! either does not exist, or is a fully initialized repo with config. Add
//! stages into the session directory and promotes with one `rename(2)`.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::formula::validate_package_name;
use crate::git;
use crate::paths::{self, Paths};

/// Config file stored inside every registered repo directory.
pub const REPO_CONFIG_FILE: &str = ".ppkg-formula-repo.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoConfig {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub timestamp_added: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_last_updated: Option<i64>,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_enabled() -> bool {
    true
}

/// A registered repo, loaded from disk.
#[derive(Debug, Clone)]
pub struct FormulaRepo {
    pub name: String,
    pub dir: PathBuf,
    pub config: RepoConfig,
}

impl FormulaRepo {
    /// Path of the formula file this repo would provide for `package`.
    pub fn formula_path(&self, package: &str) -> PathBuf {
        self.dir.join("formula").join(format!("{package}.yml"))
    }
}

#[derive(Debug)]
pub struct RepoRegistry<'a> {
    paths: &'a Paths,
}

impl<'a> RepoRegistry<'a> {
    pub fn new(paths: &'a Paths) -> Self {
        Self { paths }
    }

    /// Register a new formula repo under `name`.
    ///
    /// The clone and config are staged in the session directory and
    /// promoted to `repos.d/<name>` with a single rename, so a failed add
    /// never leaves a half-initialized repo behind.
    pub fn add(
        &self,
        name: &str,
        url: &str,
        branch: Option<&str>,
        pinned: bool,
        enabled: bool,
    ) -> Result<()> {
        validate_package_name(name)?;
        if url.is_empty() {
            return Err(Error::ArgInvalid("repo url must not be empty".to_string()));
        }
        let branch = match branch {
            Some(b) if !b.is_empty() => b,
            _ => "master",
        };

        let repo_dir = self.paths.repos_dir().join(name);
        if fs::symlink_metadata(&repo_dir).is_ok() {
            return Err(Error::RepoAlreadyExists(name.to_string()));
        }

        let session = self.paths.prepare_session()?;

        info!("Adding formula repo : {name} => {url}");

        let remote_ref = format!("refs/heads/{branch}");
        let tracking_ref = format!("refs/remotes/origin/{branch}");
        git::sync(&session, url, &remote_ref, &tracking_ref, branch)?;

        let config = RepoConfig {
            url: url.to_string(),
            branch: branch.to_string(),
            pinned,
            enabled,
            timestamp_added: chrono::Utc::now().timestamp(),
            timestamp_last_updated: None,
        };
        write_config(&session, &config)?;

        paths::ensure_dir(&self.paths.repos_dir())?;
        fs::rename(&session, &repo_dir).map_err(|e| Error::io(&repo_dir, e))?;
        Ok(())
    }

    /// Refresh an existing repo in place and stamp the sync time.
    pub fn sync(&self, name: &str) -> Result<()> {
        let repo = self.load(name)?;

        let remote_ref = format!("refs/heads/{}", repo.config.branch);
        let tracking_ref = format!("refs/remotes/origin/{}", repo.config.branch);
        git::sync(
            &repo.dir,
            &repo.config.url,
            &remote_ref,
            &tracking_ref,
            &repo.config.branch,
        )?;

        let config = RepoConfig {
            timestamp_last_updated: Some(chrono::Utc::now().timestamp()),
            ..repo.config
        };
        write_config(&repo.dir, &config)
    }

    /// Load one registered repo by name.
    pub fn load(&self, name: &str) -> Result<FormulaRepo> {
        let dir = self.paths.repos_dir().join(name);
        if !dir.is_dir() {
            return Err(Error::RepoNotFound(name.to_string()));
        }
        let config_path = dir.join(REPO_CONFIG_FILE);
        let content = fs::read_to_string(&config_path).map_err(|e| Error::io(&config_path, e))?;
        let config: RepoConfig =
            serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
                path: config_path,
                detail: e.to_string(),
            })?;
        Ok(FormulaRepo {
            name: name.to_string(),
            dir,
            config,
        })
    }

    /// All registered repos in lexicographic name order.
    pub fn list(&self) -> Result<Vec<FormulaRepo>> {
        let root = self.paths.repos_dir();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&root, e)),
        };

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&root, e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort_unstable();

        names.into_iter().map(|name| self.load(&name)).collect()
    }

    /// Registered repos with `enabled: true`, in registry order.
    pub fn enabled(&self) -> Result<Vec<FormulaRepo>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.config.enabled)
            .collect())
    }
}

fn write_config(dir: &std::path::Path, config: &RepoConfig) -> Result<()> {
    let path = dir.join(REPO_CONFIG_FILE);
    let content = serde_yaml::to_string(config).map_err(|e| Error::ConfigParse {
        path: path.clone(),
        detail: e.to_string(),
    })?;
    fs::write(&path, content).map_err(|e| Error::io(&path, e))
}
