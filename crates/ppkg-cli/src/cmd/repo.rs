//! `ppkg repo` - formula repository management.

use ppkg_core::{Paths, RepoRegistry, Result};

pub fn add(name: &str, url: &str, branch: &str, pinned: bool, enabled: bool) -> Result<()> {
    let paths = Paths::resolve()?;
    RepoRegistry::new(&paths).add(name, url, Some(branch), pinned, enabled)
}

pub fn list() -> Result<()> {
    let paths = Paths::resolve()?;

    for repo in RepoRegistry::new(&paths).list()? {
        println!("{}", repo.name);
        println!("    url     : {}", repo.config.url);
        println!("    branch  : {}", repo.config.branch);
        println!("    pinned  : {}", repo.config.pinned);
        println!("    enabled : {}", repo.config.enabled);
        println!("    added   : {}", repo.config.timestamp_added);
        if let Some(updated) = repo.config.timestamp_last_updated {
            println!("    updated : {updated}");
        }
    }
    Ok(())
}

pub fn sync(name: &str) -> Result<()> {
    let paths = Paths::resolve()?;
    RepoRegistry::new(&paths).sync(name)
}
