use std::io::{Cursor, Read, Write};

use anyhow::{Context, Result};
use tracing::debug;
use zip::ZipArchive;

use super::memfs::{MemFs, SealedFs};

/// One entry read out of the catalog archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub contents: Vec<u8>,
    pub is_dir: bool,
}

/// Read every entry of a ZIP archive into memory.
pub fn read_entries(archive: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).context("open catalog archive")?;

    let mut entries = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .with_context(|| format!("read catalog entry #{i}"))?;
        let path = file.name().to_owned();
        let is_dir = file.is_dir();

        let mut contents = Vec::new();
        if !is_dir {
            file.read_to_end(&mut contents)
                .with_context(|| format!("decompress catalog entry {path}"))?;
        }

        entries.push(ArchiveEntry {
            path,
            contents,
            is_dir,
        });
    }
    Ok(entries)
}

/// Materialise `entries` into a fresh filesystem and seal it.
pub fn load_entries(entries: Vec<ArchiveEntry>) -> Result<SealedFs> {
    let mut fs = MemFs::new();

    for entry in entries {
        if entry.is_dir {
            fs.mkdir_all(&entry.path)
                .with_context(|| format!("create directory {}", entry.path))?;
            continue;
        }

        let parent = entry.path.rsplit_once('/').map_or("", |(dir, _)| dir);
        fs.mkdir_all(parent)
            .with_context(|| format!("create directory {parent}"))?;

        let mut file = fs
            .create(&entry.path)
            .with_context(|| format!("create file {}", entry.path))?;
        file.write_all(&entry.contents)
            .with_context(|| format!("write file {}", entry.path))?;
        file.close()
            .with_context(|| format!("close file {}", entry.path))?;

        debug!(path = %entry.path, bytes = entry.contents.len(), "loaded catalog file");
    }

    Ok(fs.seal())
}

/// Decode a ZIP archive into a sealed filesystem.
pub fn load_archive(archive: &[u8]) -> Result<SealedFs> {
    load_entries(read_entries(archive)?)
}
