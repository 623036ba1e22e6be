//! Archive format detection and expansion.
//!
//! Tarballs (plain or gzip-compressed) are unpacked on the blocking pool with the
//! `tar` crate; zip archives are read in memory with `async_zip`. Entries keep the
//! directory layout stored in the archive.
//!
//! **Security:** entries with `..` components or absolute paths are rejected before
//! anything is written.

use crate::error::FetchError;
use bytes::Bytes;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Component, Path};

/// Supported archive encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// gzip-compressed tar
    TarGz,
    /// Uncompressed tar
    Tar,
    /// Zip
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from the leading bytes of the payload
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveFormat::TarGz)
        } else if data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06") {
            Some(ArchiveFormat::Zip)
        } else if data.get(257..262) == Some(b"ustar".as_slice()) {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }

    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expand `data` into `dest`, returning the number of entries written
pub async fn expand(format: ArchiveFormat, data: Bytes, dest: &Path) -> Result<usize, FetchError> {
    match format {
        ArchiveFormat::Zip => extract_zip(&data, dest).await,
        ArchiveFormat::TarGz | ArchiveFormat::Tar => {
            let dest = dest.to_path_buf();
            tokio::task::spawn_blocking(move || {
                let cursor = Cursor::new(data);
                if format == ArchiveFormat::TarGz {
                    unpack_tar(flate2::read::GzDecoder::new(cursor), &dest, format)
                } else {
                    unpack_tar(cursor, &dest, format)
                }
            })
            .await
            .map_err(|e| FetchError::Io(std::io::Error::other(e)))?
        }
    }
}

fn unpack_tar<R: Read>(reader: R, dest: &Path, format: ArchiveFormat) -> Result<usize, FetchError> {
    let corrupt = |e: std::io::Error| FetchError::CorruptArchive {
        format: format.to_string(),
        reason: e.to_string(),
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut count = 0;
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let path = entry.path().map_err(corrupt)?.into_owned();
        ensure_relative(&path)?;

        if !entry.unpack_in(dest)? {
            return Err(FetchError::UnsafeEntry {
                entry: path.display().to_string(),
            });
        }
        count += 1;
    }

    if count == 0 {
        return Err(FetchError::CorruptArchive {
            format: format.to_string(),
            reason: "archive contains no entries".to_string(),
        });
    }
    Ok(count)
}

/// Extracts a ZIP archive from memory into a destination directory.
///
/// Every entry name is checked before the first file is written.
async fn extract_zip(data: &[u8], dest: &Path) -> Result<usize, FetchError> {
    use async_zip::base::read::mem::ZipFileReader;
    use futures_lite::io::AsyncReadExt as _;

    let corrupt = |reason: String| FetchError::CorruptArchive {
        format: ArchiveFormat::Zip.to_string(),
        reason,
    };

    let reader = ZipFileReader::new(data.to_vec())
        .await
        .map_err(|e| corrupt(format!("Failed to read ZIP archive: {}", e)))?;

    let mut entries = Vec::with_capacity(reader.file().entries().len());
    for (i, entry) in reader.file().entries().iter().enumerate() {
        let filename = entry
            .filename()
            .as_str()
            .map_err(|e| corrupt(format!("Invalid filename in ZIP: {}", e)))?
            .to_string();

        if filename.contains('\\') {
            return Err(FetchError::UnsafeEntry { entry: filename });
        }
        ensure_relative(Path::new(&filename))?;

        let is_dir = entry
            .dir()
            .map_err(|e| corrupt(format!("Failed to check if entry is directory: {}", e)))?;
        entries.push((i, filename, is_dir));
    }

    if entries.is_empty() {
        return Err(corrupt("archive contains no entries".to_string()));
    }

    for (i, filename, is_dir) in &entries {
        let target = dest.join(filename);
        if *is_dir {
            tokio::fs::create_dir_all(&target).await?;
            continue;
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut entry_reader = reader
            .reader_with_entry(*i)
            .await
            .map_err(|e| corrupt(format!("Failed to read ZIP entry: {}", e)))?;
        let mut content = Vec::new();
        entry_reader
            .read_to_end(&mut content)
            .await
            .map_err(|e| corrupt(format!("Failed to inflate {}: {}", filename, e)))?;

        tokio::fs::write(&target, content).await?;
    }

    Ok(entries.len())
}

fn ensure_relative(path: &Path) -> Result<(), FetchError> {
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(FetchError::UnsafeEntry {
            entry: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        use std::io::Write;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_detect_formats() {
        let tar = tarball(&[("a.txt", "a")]);
        assert_eq!(ArchiveFormat::detect(&tar), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect(&gzip(&tar)), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(b"<html>not found</html>"), None);
        assert_eq!(ArchiveFormat::detect(&[]), None);
    }

    #[tokio::test]
    async fn test_expand_tar_gz_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let data = gzip(&tarball(&[
            ("package.json", "{}"),
            ("core/server/index.js", "module.exports = 1;"),
        ]));

        let count = expand(ArchiveFormat::TarGz, Bytes::from(data), dir.path())
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert!(dir.path().join("package.json").is_file());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("core/server/index.js")).unwrap(),
            "module.exports = 1;"
        );
    }

    #[tokio::test]
    async fn test_expand_invalid_deflate_stream_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        // Valid gzip header followed by a reserved deflate block type
        let data = Bytes::from_static(&[0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);

        let err = expand(ArchiveFormat::TarGz, data, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::CorruptArchive { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, content) in files {
            writer
                .start_file(*path, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_empty_archives_are_corrupt_in_every_format() {
        let dir = tempfile::tempdir().unwrap();

        let empty_zip = zip_archive(&[]);
        assert_eq!(ArchiveFormat::detect(&empty_zip), Some(ArchiveFormat::Zip));
        let err = expand(ArchiveFormat::Zip, Bytes::from(empty_zip), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::CorruptArchive { .. }));

        let empty_tar = gzip(&tarball(&[]));
        let err = expand(ArchiveFormat::TarGz, Bytes::from(empty_tar), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::CorruptArchive { .. }));
    }

    #[tokio::test]
    async fn test_zip_with_escaping_entry_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("tree");
        std::fs::create_dir(&dest).unwrap();
        let data = zip_archive(&[("index.js", "ok"), ("../evil.txt", "pwned")]);

        let err = expand(ArchiveFormat::Zip, Bytes::from(data), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::UnsafeEntry { .. }));
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
        assert!(!root.path().join("evil.txt").exists());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        assert!(ensure_relative(Path::new("content/images/a.png")).is_ok());
        assert!(matches!(
            ensure_relative(Path::new("../etc/passwd")),
            Err(FetchError::UnsafeEntry { .. })
        ));
        assert!(matches!(
            ensure_relative(Path::new("/etc/passwd")),
            Err(FetchError::UnsafeEntry { .. })
        ));
    }
}
