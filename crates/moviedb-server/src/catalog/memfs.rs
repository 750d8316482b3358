//! Path-addressed in-memory filesystem with a one-way seal.
//!
//! [`MemFs`] is the writable builder used while loading; [`MemFs::seal`]
//! consumes it and returns a [`SealedFs`], which has no mutating API at all and
//! can be shared across request tasks without locking.

use std::collections::BTreeMap;
use std::io;

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FsError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
}

/// Split a slash-separated path into components. Empty and `.` components are
/// skipped; `..` is rejected rather than resolved.
fn components(path: &str) -> Result<Vec<&str>, FsError> {
    let mut out = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(FsError::InvalidPath(path.to_owned())),
            p => out.push(p),
        }
    }
    Ok(out)
}

enum Node {
    Dir(BTreeMap<String, Node>),
    File(Vec<u8>),
}

/// Writable filesystem used during startup loading.
pub struct MemFs {
    root: BTreeMap<String, Node>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            root: BTreeMap::new(),
        }
    }

    /// Create `path` and any missing parents. Existing directories are fine;
    /// an existing file anywhere along the path is not.
    pub fn mkdir_all(&mut self, path: &str) -> Result<(), FsError> {
        let mut dir = &mut self.root;
        for part in components(path)? {
            let node = dir
                .entry(part.to_owned())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            dir = match node {
                Node::Dir(children) => children,
                Node::File(_) => return Err(FsError::NotADirectory(path.to_owned())),
            };
        }
        Ok(())
    }

    /// Create (or truncate) the file at `path`. The parent directory must
    /// already exist. Bytes written to the returned handle land in the file;
    /// the handle must be closed before the filesystem can be used again.
    pub fn create(&mut self, path: &str) -> Result<FileWriter<'_>, FsError> {
        let parts = components(path)?;
        let (name, parents) = parts
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_owned()))?;

        let mut dir = &mut self.root;
        for part in parents {
            dir = match dir.get_mut(*part) {
                Some(Node::Dir(children)) => children,
                Some(Node::File(_)) => return Err(FsError::NotADirectory(path.to_owned())),
                None => return Err(FsError::NotFound(path.to_owned())),
            };
        }

        let node = dir
            .entry((*name).to_owned())
            .or_insert_with(|| Node::File(Vec::new()));
        match node {
            Node::File(data) => {
                data.clear();
                Ok(FileWriter { data })
            }
            Node::Dir(_) => Err(FsError::IsADirectory(path.to_owned())),
        }
    }

    /// Freeze the tree. There is no way back.
    pub fn seal(self) -> SealedFs {
        SealedFs {
            root: Entry::Dir(freeze(self.root)),
        }
    }
}

fn freeze(dir: BTreeMap<String, Node>) -> BTreeMap<String, Entry> {
    dir.into_iter()
        .map(|(name, node)| {
            let entry = match node {
                Node::Dir(children) => Entry::Dir(freeze(children)),
                Node::File(data) => Entry::File(Bytes::from(data)),
            };
            (name, entry)
        })
        .collect()
}

/// Open handle on a file being written.
pub struct FileWriter<'a> {
    data: &'a mut Vec<u8>,
}

impl FileWriter<'_> {
    pub fn close(self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for FileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read-only node of a sealed filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(Bytes),
    Dir(BTreeMap<String, Entry>),
}

/// Immutable filesystem produced by [`MemFs::seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedFs {
    root: Entry,
}

impl SealedFs {
    /// Look up `path` exactly. `""` and `"/"` are the root directory.
    pub fn open(&self, path: &str) -> Result<&Entry, FsError> {
        let mut entry = &self.root;
        for part in components(path)? {
            entry = match entry {
                Entry::Dir(children) => children
                    .get(part)
                    .ok_or_else(|| FsError::NotFound(path.to_owned()))?,
                Entry::File(_) => return Err(FsError::NotADirectory(path.to_owned())),
            };
        }
        Ok(entry)
    }

    /// Contents of the file at `path`.
    pub fn read(&self, path: &str) -> Result<Bytes, FsError> {
        match self.open(path)? {
            Entry::File(data) => Ok(data.clone()),
            Entry::Dir(_) => Err(FsError::IsADirectory(path.to_owned())),
        }
    }

    /// Names directly under the directory at `path`, sorted. Sub-directories
    /// carry a trailing `/`.
    pub fn read_dir(&self, path: &str) -> Result<Vec<String>, FsError> {
        match self.open(path)? {
            Entry::Dir(children) => Ok(children
                .iter()
                .map(|(name, entry)| match entry {
                    Entry::Dir(_) => format!("{name}/"),
                    Entry::File(_) => name.clone(),
                })
                .collect()),
            Entry::File(_) => Err(FsError::NotADirectory(path.to_owned())),
        }
    }

    /// Every file as `(path, contents)`, in path order.
    pub fn files(&self) -> Vec<(String, Bytes)> {
        let mut out = Vec::new();
        collect_files(&self.root, String::new(), &mut out);
        out
    }
}

fn collect_files(entry: &Entry, prefix: String, out: &mut Vec<(String, Bytes)>) {
    match entry {
        Entry::File(data) => out.push((prefix, data.clone())),
        Entry::Dir(children) => {
            for (name, child) in children {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                collect_files(child, path, out);
            }
        }
    }
}
