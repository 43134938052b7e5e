//! Input file reading and in-place write helpers.
//!
//! Migration dumps often arrive compressed; the reader decompresses by
//! file extension before handing a UTF-8 string to the engine. In-place
//! rewrites go through a timestamped backup so the original text is
//! never lost.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Compression format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    /// Detect compression format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            Some("bz2" | "bzip2") => Compression::Bzip2,
            Some("xz" | "lzma") => Compression::Xz,
            Some("zst" | "zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Wrap a reader with the appropriate decompressor
    pub fn wrap_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> anyhow::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// Read a SQL file into a string, decompressing by extension.
pub fn read_to_string(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("input file does not exist: {}", path.display());
    }

    let file = File::open(path)?;
    let compression = Compression::from_path(path);
    let mut reader = compression.wrap_reader(Box::new(file))?;
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// Backup path for an in-place rewrite: `file.sql.20260807T120000Z.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.bak", stamp));
    path.with_file_name(name)
}

/// Copy the original file to a timestamped backup before overwriting.
pub fn write_backup(path: &Path) -> anyhow::Result<PathBuf> {
    let backup = backup_path(path);
    std::fs::copy(path, &backup)?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_path() {
        assert_eq!(Compression::from_path(Path::new("a.sql")), Compression::None);
        assert_eq!(Compression::from_path(Path::new("a.sql.gz")), Compression::Gzip);
        assert_eq!(Compression::from_path(Path::new("a.sql.bz2")), Compression::Bzip2);
        assert_eq!(Compression::from_path(Path::new("a.sql.xz")), Compression::Xz);
        assert_eq!(Compression::from_path(Path::new("a.sql.zst")), Compression::Zstd);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let err = read_to_string(Path::new("/nonexistent/input.sql")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_backup_path_keeps_directory() {
        let backup = backup_path(Path::new("/tmp/migrations/procs.sql"));
        assert!(backup.starts_with("/tmp/migrations"));
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("procs.sql."));
        assert!(name.ends_with(".bak"));
    }
}
