//! The installation pipeline.
//!
//! Installing a package runs, in order: formula resolution, dependency
//! installs (post-order), cache fetch, install-root preparation, payload
//! placement, install-script execution, manifest recording, receipt
//! writing, and symlink promotion. Promotion is the commit point: until
//! the stable link `installed/<name>` is repointed, consumers keep seeing
//! the previous install, and a failure mid-pipeline only ever leaves an
//! orphaned `installed/<session-id>` directory behind.

use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, symlink};
use std::path::Path;

use tracing::{debug, info};

use crate::cache::{self, DownloadCache};
use crate::error::{Error, Result};
use crate::extract;
use crate::formula::Formula;
use crate::hash;
use crate::manifest::{self, META_DIR};
use crate::paths::{self, Paths};
use crate::process;
use crate::receipt;
use crate::resolver::Resolver;
use crate::sysinfo::SysInfo;

/// Attempts to replace a contested stable link before giving up.
const LINK_RETRY_LIMIT: u32 = 16;

#[derive(Debug)]
pub struct InstallEngine<'a> {
    paths: &'a Paths,
    resolver: Resolver<'a>,
    cache: DownloadCache<'a>,
}

impl<'a> InstallEngine<'a> {
    pub fn new(paths: &'a Paths, target_platform: Option<&str>) -> Self {
        Self {
            paths,
            resolver: Resolver::new(paths, target_platform),
            cache: DownloadCache::new(paths),
        }
    }

    /// Install `package` and, first, its transitive dependencies.
    ///
    /// With `force` unset, packages that already have a valid installed
    /// link are skipped; with it set they are reinstalled under a fresh
    /// session id and the link is repointed.
    pub fn install(&self, package: &str, force: bool) -> Result<()> {
        let formula = self.resolver.lookup(package)?;

        for dep in formula.dependencies() {
            if dep == package {
                return Err(Error::SelfDependency(package.to_string()));
            }
        }
        for dep in formula.dependencies() {
            self.install(dep, force)?;
        }

        if !force && self.is_installed(package) {
            info!("package '{package}' already has been installed.");
            return Ok(());
        }

        debug!("prepare to install package [{package}].");

        let timestamp = chrono::Utc::now().timestamp();
        let pid = std::process::id();
        let session_id =
            hash::sha256_of_bytes(format!("{}|{timestamp}|{pid}", formula.bin_url));
        debug!(%session_id, bin_sha = %formula.bin_sha);

        let extension = cache::file_extension_from_url(&formula.bin_url);
        let bin_path = self
            .cache
            .fetch(&formula.bin_url, &formula.bin_sha, &extension, &session_id)?;
        let bin_filename = format!("{}{extension}", formula.bin_sha);

        let installed_root = self.paths.installed_dir();
        paths::ensure_dir(&installed_root)?;

        let install_dir = installed_root.join(&session_id);
        fresh_dir(&install_dir)?;

        if extract::is_archive_extension(&extension) {
            let dest = match &formula.unpackd {
                Some(sub) => install_dir.join(sub),
                None => install_dir.clone(),
            };
            extract::extract(&bin_path, &dest, &extension)?;
        } else {
            extract::copy_file(&bin_path, &install_dir.join(&session_id))?;
        }

        if let Some(script) = formula.install.as_deref().filter(|s| !s.is_empty()) {
            self.run_install_script(
                package,
                &formula,
                script,
                &install_dir,
                &bin_filename,
                &extension,
                &bin_path,
            )?;
        }

        let meta_dir = install_dir.join(META_DIR);
        fs::DirBuilder::new()
            .mode(0o700)
            .create(&meta_dir)
            .map_err(|e| Error::io(&meta_dir, e))?;

        manifest::record(&install_dir)?;
        receipt::write(&install_dir, package, &formula, timestamp)?;

        promote_link(&installed_root, &session_id, package)?;
        info!("{package} package was successfully installed.");
        Ok(())
    }

    /// A package counts as installed when its stable name is a symlink
    /// whose target carries a receipt.
    pub fn is_installed(&self, package: &str) -> bool {
        let link = self.paths.installed_dir().join(package);
        let Ok(md) = fs::symlink_metadata(&link) else {
            return false;
        };
        md.is_symlink() && link.join(META_DIR).join(receipt::RECEIPT_FILE).is_file()
    }

    #[allow(clippy::too_many_arguments)]
    fn run_install_script(
        &self,
        package: &str,
        formula: &Formula,
        script: &str,
        install_dir: &Path,
        bin_filename: &str,
        extension: &str,
        bin_path: &Path,
    ) -> Result<()> {
        let sysinfo = SysInfo::probe();
        let link_dir = self.paths.installed_dir().join(package);

        let shell_code = build_shell_code(
            &sysinfo,
            self.paths.home(),
            formula,
            bin_filename,
            extension,
            bin_path,
            &link_dir,
            script,
        );

        debug!("run shell code:\n{shell_code}");

        let status =
            process::spawn_and_wait("/bin/sh", ["-c", shell_code.as_str()], Some(install_dir))
                .map_err(|e| Error::io(install_dir, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::InstallScriptFailed {
                package: package.to_string(),
                status,
            })
        }
    }
}

/// Create `path` as a fresh, empty directory, clearing whatever sits there.
fn fresh_dir(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(md) if md.is_dir() => {
            fs::remove_dir_all(path).map_err(|e| Error::io(path, e))?;
        }
        Ok(_) => {
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(path, e)),
    }
    fs::DirBuilder::new()
        .mode(0o700)
        .create(path)
        .map_err(|e| Error::io(path, e))
}

/// Point `installed/<package>` at `installed/<session_id>`.
///
/// Symlink replacement is remove-then-create, so a concurrent writer can
/// re-create the name between our unlink and symlink; retry a bounded
/// number of times.
fn promote_link(installed_root: &Path, session_id: &str, package: &str) -> Result<()> {
    let link = installed_root.join(package);

    for _ in 0..LINK_RETRY_LIMIT {
        match symlink(session_id, &link) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match fs::symlink_metadata(&link) {
                    Ok(md) if md.is_dir() => {
                        fs::remove_dir_all(&link).map_err(|e| Error::io(&link, e))?;
                    }
                    Ok(_) => {
                        fs::remove_file(&link).map_err(|e| Error::io(&link, e))?;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::io(&link, e)),
                }
            }
            Err(e) => return Err(Error::io(&link, e)),
        }
    }

    Err(Error::io(
        &link,
        io::Error::other("could not replace the installed link"),
    ))
}

/// Single-quote a value for inclusion in the script prelude.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[allow(clippy::too_many_arguments)]
fn build_shell_code(
    sysinfo: &SysInfo,
    home: &Path,
    formula: &Formula,
    bin_filename: &str,
    extension: &str,
    bin_path: &Path,
    link_dir: &Path,
    install_body: &str,
) -> String {
    let opt = |v: &Option<String>| sh_quote(v.as_deref().unwrap_or(""));

    format!(
        "set -ex\n\n\
         NATIVE_OS_KIND={kind}\n\
         NATIVE_OS_TYPE={os_type}\n\
         NATIVE_OS_NAME={name}\n\
         NATIVE_OS_VERS={vers}\n\
         NATIVE_OS_LIBC={libc}\n\
         NATIVE_OS_ARCH={arch}\n\
         NATIVE_OS_NCPU='{ncpu}'\n\n\
         PPKG_VERSION='{version}'\n\
         PPKG_VERSION_MAJOR='{major}'\n\
         PPKG_VERSION_MINOR='{minor}'\n\
         PPKG_VERSION_PATCH='{patch}'\n\
         PPKG_HOME={home}\n\n\
         PKG_SUMMARY={summary}\n\
         PKG_WEBPAGE={webpage}\n\
         PKG_VERSION={pkg_version}\n\
         PKG_BIN_URL={bin_url}\n\
         PKG_BIN_SHA={bin_sha}\n\
         PKG_DEP_PKG={dep_pkg}\n\
         PKG_BIN_FILENAME={bin_filename}\n\
         PKG_BIN_FILETYPE={bin_filetype}\n\
         PKG_BIN_FILEPATH={bin_filepath}\n\
         PKG_INSTALL_DIR={install_dir}\n\n\
         for item in $PKG_DEP_PKG\n\
         do\n\
         if [ -d \"$PPKG_HOME/installed/$item/bin\" ] ; then\n\
         PATH=\"$PPKG_HOME/installed/$item/bin:$PATH\"\n\
         fi\n\
         done\n\n\
         pwd\n\
         {install_body}",
        kind = sh_quote(&sysinfo.kind),
        os_type = sh_quote(&sysinfo.os_type),
        name = sh_quote(&sysinfo.name),
        vers = sh_quote(&sysinfo.version),
        libc = sh_quote(sysinfo.libc.as_str()),
        arch = sh_quote(&sysinfo.arch),
        ncpu = sysinfo.ncpu,
        version = crate::VERSION,
        major = env!("CARGO_PKG_VERSION_MAJOR"),
        minor = env!("CARGO_PKG_VERSION_MINOR"),
        patch = env!("CARGO_PKG_VERSION_PATCH"),
        home = sh_quote(&home.to_string_lossy()),
        summary = opt(&formula.summary),
        webpage = opt(&formula.webpage),
        pkg_version = opt(&formula.version),
        bin_url = sh_quote(&formula.bin_url),
        bin_sha = sh_quote(&formula.bin_sha),
        dep_pkg = opt(&formula.dep_pkg),
        bin_filename = sh_quote(bin_filename),
        bin_filetype = sh_quote(extension),
        bin_filepath = sh_quote(&bin_path.to_string_lossy()),
        install_dir = sh_quote(&link_dir.to_string_lossy()),
    )
}
