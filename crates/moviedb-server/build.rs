//! Packs `catalog/` into a ZIP archive, obfuscates it and drops the result in
//! `OUT_DIR/movies.db` for `include_bytes!`.
//!
//! Blob layout: `key[0..KEY_LEN] ++ (zip[j] ^ key[j % KEY_LEN])`. Keep in sync
//! with `src/catalog/obfuscation.rs`.

use std::io::{Cursor, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const KEY_LEN: usize = 100;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")?;
    let catalog_dir = Path::new(&manifest_dir).join("catalog");
    println!("cargo:rerun-if-changed={}", catalog_dir.display());

    let archive = pack(&catalog_dir)?;
    let blob = obfuscate(&archive);

    let out = Path::new(&std::env::var("OUT_DIR")?).join("movies.db");
    std::fs::write(&out, blob)?;
    Ok(())
}

fn pack(root: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(root)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(rel, options)?;
        } else {
            zip.start_file(rel, options)?;
            zip.write_all(&std::fs::read(entry.path())?)?;
        }
    }

    Ok(zip.finish()?.into_inner())
}

fn obfuscate(payload: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(KEY_LEN);
    let mut digest = Sha256::digest(payload);
    while key.len() < KEY_LEN {
        key.extend_from_slice(&digest);
        digest = Sha256::digest(digest);
    }
    key.truncate(KEY_LEN);

    let mut blob = key.clone();
    blob.extend(
        payload
            .iter()
            .enumerate()
            .map(|(j, b)| b ^ key[j % KEY_LEN]),
    );
    blob
}
