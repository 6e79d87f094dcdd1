//! Archive extraction for prebuilt-binary payloads.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Extensions the install pipeline treats as archives; anything else is
/// copied verbatim.
pub const ARCHIVE_EXTENSIONS: [&str; 5] = [".zip", ".tgz", ".txz", ".tlz", ".tbz2"];

pub fn is_archive_extension(extension: &str) -> bool {
    ARCHIVE_EXTENSIONS.contains(&extension)
}

/// Extract `archive` into `dest`, preserving modification times.
pub fn extract(archive: &Path, dest: &Path, extension: &str) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;

    let archive_err = |detail: String| Error::Archive {
        path: archive.to_path_buf(),
        detail,
    };

    let open = || -> Result<BufReader<File>> {
        Ok(BufReader::new(
            File::open(archive).map_err(|e| Error::io(archive, e))?,
        ))
    };

    match extension {
        ".tgz" => untar(flate2::read::GzDecoder::new(open()?), archive, dest),
        ".txz" => untar(xz2::read::XzDecoder::new(open()?), archive, dest),
        ".tlz" => {
            // .tlz payloads use the legacy lzma-alone container.
            let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
                .map_err(|e| archive_err(e.to_string()))?;
            untar(
                xz2::read::XzDecoder::new_stream(open()?, stream),
                archive,
                dest,
            )
        }
        ".tbz2" => untar(bzip2::read::BzDecoder::new(open()?), archive, dest),
        ".zip" => {
            let zip_file = File::open(archive).map_err(|e| Error::io(archive, e))?;
            let mut zip = zip::ZipArchive::new(zip_file).map_err(|e| archive_err(e.to_string()))?;
            zip.extract(dest).map_err(|e| archive_err(e.to_string()))
        }
        other => Err(archive_err(format!("unsupported archive extension '{other}'"))),
    }
}

fn untar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_mtime(true);
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| Error::Archive {
        path: archive.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Copy a non-archive artifact byte-for-byte.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::copy(src, dest)
        .map(|_| ())
        .map_err(|e| Error::io(dest, e))
}

/// Try to rename `src` to `dest`; fall back to copy-and-unlink when the
/// rename crosses a filesystem boundary.
pub fn rename_or_copy(src: &Path, dest: &Path) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dest).map_err(|e| Error::io(dest, e))?;
            let _ = fs::remove_file(src);
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn build_tgz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
            Vec::new(),
            flate2::Compression::default(),
        ));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_mtime(1_700_000_000);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_is_archive_extension() {
        for ext in ARCHIVE_EXTENSIONS {
            assert!(is_archive_extension(ext));
        }
        assert!(!is_archive_extension(""));
        assert!(!is_archive_extension(".exe"));
    }

    #[test]
    fn test_extract_tgz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.tgz");
        fs::write(
            &archive,
            build_tgz(&[("bin/jq", b"#!/bin/sh\n" as &[u8]), ("share/doc.txt", b"docs")]),
        )
        .unwrap();

        let dest = dir.path().join("out");
        extract(&archive, &dest, ".tgz").unwrap();

        assert_eq!(fs::read(dest.join("share/doc.txt")).unwrap(), b"docs");
        let md = fs::metadata(dest.join("bin/jq")).unwrap();
        assert_eq!(md.modified().unwrap(), std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000));
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("hello.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"zip content").unwrap();
            zip.finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract(&archive, &dest, ".zip").unwrap();
        assert_eq!(fs::read(dest.join("hello.txt")).unwrap(), b"zip content");
    }

    #[test]
    fn test_garbage_archive_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.tgz");
        fs::write(&archive, b"not gzip at all").unwrap();

        let err = extract(&archive, &dir.path().join("out"), ".tgz").unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }

    #[test]
    fn test_rename_or_copy_moves_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&src, "payload").unwrap();

        rename_or_copy(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
    }
}
