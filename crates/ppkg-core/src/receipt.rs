//! Tamper-evident installation receipts.
//!
//! A receipt embeds the formula file byte-for-byte between a package-name
//! header and a provenance footer:
//!
//! ```text
//! pkgname: <name>
//! <formula bytes, verbatim>
//! signature: <tool version>
//! timestamp: <unix seconds>
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::manifest::META_DIR;

/// Receipt file name inside the metadata directory.
pub const RECEIPT_FILE: &str = "receipt.yml";

/// Write `.uppm/receipt.yml` under `install_root`.
pub fn write(
    install_root: &Path,
    package: &str,
    formula: &Formula,
    timestamp: i64,
) -> Result<PathBuf> {
    let path = install_root.join(META_DIR).join(RECEIPT_FILE);
    let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "pkgname: {package}").map_err(|e| Error::io(&path, e))?;

    let mut src = File::open(&formula.path).map_err(|e| Error::io(&formula.path, e))?;
    io::copy(&mut src, &mut out).map_err(|e| Error::io(&path, e))?;

    write!(
        out,
        "\nsignature: {}\ntimestamp: {timestamp}\n",
        crate::VERSION
    )
    .map_err(|e| Error::io(&path, e))?;

    out.flush().map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FORMULA_TEXT: &str = "bin-url: https://example.com/a.tgz\nbin-sha: 5de8c8e29aaa3fb9cc6b47bb27299f271354ebb72514e3accadc7d38b5bbaa72\n";

    #[test]
    fn test_receipt_frames_the_formula_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let formula_path = dir.path().join("jq.yml");
        fs::write(&formula_path, FORMULA_TEXT).unwrap();
        let formula = Formula::load(&formula_path, None).unwrap();

        let root = dir.path().join("install");
        fs::create_dir_all(root.join(META_DIR)).unwrap();

        let path = write(&root, "jq", &formula, 1_700_000_000).unwrap();
        let content = fs::read_to_string(path).unwrap();

        let expected = format!(
            "pkgname: jq\n{FORMULA_TEXT}\nsignature: {}\ntimestamp: 1700000000\n",
            crate::VERSION
        );
        assert_eq!(content, expected);
    }
}
