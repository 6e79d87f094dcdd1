//! Host probing for the install-script environment.

use std::fmt;
use std::fs;

/// The libc the running binary was linked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Libc {
    Glibc,
    Musl,
    Unknown,
}

impl Libc {
    /// The value exported as `NATIVE_OS_LIBC`; empty when unknown.
    pub fn as_str(self) -> &'static str {
        match self {
            Libc::Glibc => "glibc",
            Libc::Musl => "musl",
            Libc::Unknown => "",
        }
    }
}

impl fmt::Display for Libc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SysInfo {
    /// OS family, e.g. `linux`, `darwin`, `freebsd`.
    pub kind: String,
    /// Raw OS identifier as the toolchain reports it.
    pub os_type: String,
    /// Distribution or product name.
    pub name: String,
    /// Distribution or product version.
    pub version: String,
    pub libc: Libc,
    pub arch: String,
    pub ncpu: u32,
}

impl SysInfo {
    pub fn probe() -> Self {
        let os = std::env::consts::OS;
        let kind = if os == "macos" { "darwin" } else { os };

        let (name, version) = if os == "linux" {
            fs::read_to_string("/etc/os-release")
                .map(|content| parse_os_release(&content))
                .unwrap_or_default()
        } else {
            (String::new(), String::new())
        };

        SysInfo {
            kind: kind.to_string(),
            os_type: os.to_string(),
            name: if name.is_empty() { kind.to_string() } else { name },
            version,
            libc: detect_libc(),
            arch: std::env::consts::ARCH.to_string(),
            ncpu: num_cpus::get() as u32,
        }
    }
}

fn detect_libc() -> Libc {
    if cfg!(target_env = "musl") {
        Libc::Musl
    } else if cfg!(all(target_os = "linux", target_env = "gnu")) {
        Libc::Glibc
    } else {
        Libc::Unknown
    }
}

/// Pull `NAME` and `VERSION_ID` out of os-release syntax.
fn parse_os_release(content: &str) -> (String, String) {
    let mut name = String::new();
    let mut version = String::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            match key {
                "NAME" => name = value.to_string(),
                "VERSION_ID" => version = value.to_string(),
                _ => {}
            }
        }
    }
    (name, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_fills_required_fields() {
        let info = SysInfo::probe();
        assert!(!info.kind.is_empty());
        assert!(!info.arch.is_empty());
        assert!(info.ncpu > 0);
    }

    #[test]
    fn test_parse_os_release() {
        let sample = "NAME=\"Alpine Linux\"\nID=alpine\nVERSION_ID=3.20.0\nPRETTY_NAME=\"Alpine Linux v3.20\"\n";
        let (name, version) = parse_os_release(sample);
        assert_eq!(name, "Alpine Linux");
        assert_eq!(version, "3.20.0");
    }

    #[test]
    fn test_parse_os_release_tolerates_missing_fields() {
        let (name, version) = parse_os_release("ID=unknown\n");
        assert!(name.is_empty());
        assert!(version.is_empty());
    }
}
