//! Formula lookup across enabled repositories.

use tracing::debug;

use crate::error::{Error, Result};
use crate::formula::{Formula, validate_package_name};
use crate::paths::Paths;
use crate::repo::RepoRegistry;

/// Locates formulas by package name. The registry is re-enumerated on every
/// lookup; results are not cached across calls.
#[derive(Debug)]
pub struct Resolver<'a> {
    paths: &'a Paths,
    target_platform: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(paths: &'a Paths, target_platform: Option<&str>) -> Self {
        Self {
            paths,
            target_platform: target_platform.map(str::to_string),
        }
    }

    /// Find `package` in the first enabled repo that provides it.
    pub fn lookup(&self, package: &str) -> Result<Formula> {
        validate_package_name(package)?;

        for repo in RepoRegistry::new(self.paths).enabled()? {
            let candidate = repo.formula_path(package);
            if candidate.is_file() {
                debug!(package, repo = %repo.name, "formula found");
                return Formula::load(&candidate, self.target_platform.as_deref());
            }
        }

        Err(Error::FormulaNotFound(package.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::tests::plant_repo;
    use std::fs;

    const LEAF: &str = "bin-url: https://example.com/a.tgz\nbin-sha: 5de8c8e29aaa3fb9cc6b47bb27299f271354ebb72514e3accadc7d38b5bbaa72\n";

    fn paths_in_temp() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_home(dir.path().join(".ppkg")).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_lookup_prefers_first_repo_in_registry_order() {
        let (_tmp, paths) = paths_in_temp();
        let first = plant_repo(&paths, "aaa", true);
        let second = plant_repo(&paths, "bbb", true);
        fs::write(first.join("formula/jq.yml"), LEAF).unwrap();
        fs::write(
            second.join("formula/jq.yml"),
            LEAF.replace("a.tgz", "b.tgz"),
        )
        .unwrap();

        let formula = Resolver::new(&paths, None).lookup("jq").unwrap();
        assert!(formula.bin_url.ends_with("a.tgz"));
        assert!(formula.path.starts_with(&first));
    }

    #[test]
    fn test_lookup_skips_disabled_repos() {
        let (_tmp, paths) = paths_in_temp();
        let disabled = plant_repo(&paths, "aaa", false);
        fs::write(disabled.join("formula/jq.yml"), LEAF).unwrap();

        let err = Resolver::new(&paths, None).lookup("jq").unwrap_err();
        assert!(matches!(err, Error::FormulaNotFound(name) if name == "jq"));
    }

    #[test]
    fn test_lookup_rejects_invalid_names() {
        let (_tmp, paths) = paths_in_temp();
        let err = Resolver::new(&paths, None).lookup("no/slashes").unwrap_err();
        assert!(matches!(err, Error::ArgInvalid(_)));
    }
}
