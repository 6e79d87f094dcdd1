//! `ppkg install`

use ppkg_core::{InstallEngine, Paths, Result};

pub fn install(packages: &[String], platform: Option<&str>, force: bool) -> Result<()> {
    let paths = Paths::resolve()?;
    let engine = InstallEngine::new(&paths, platform);

    for package in packages {
        engine.install(package, force)?;
    }
    Ok(())
}
