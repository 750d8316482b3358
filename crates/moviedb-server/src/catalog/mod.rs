//! The movie catalog: an obfuscated ZIP baked into the binary, decoded once at
//! startup into a sealed in-memory filesystem laid out as `{year}/{page}`.

pub mod loader;
pub mod memfs;
pub mod obfuscation;

use anyhow::{Context, Result};

pub use loader::{load_archive, ArchiveEntry};
pub use memfs::{Entry, FsError, MemFs, SealedFs};
pub use obfuscation::{deobfuscate, ObfuscationError, KEY_LEN};

/// Produced by `build.rs` from the `catalog/` directory.
static EMBEDDED: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/movies.db"));

/// Decode an obfuscated catalog blob.
pub fn load_blob(blob: &[u8]) -> Result<SealedFs> {
    let archive = deobfuscate(blob).context("de-obfuscate catalog")?;
    load_archive(&archive).context("load catalog archive")
}

/// Decode the catalog compiled into this binary.
pub fn load_embedded() -> Result<SealedFs> {
    load_blob(EMBEDDED)
}
