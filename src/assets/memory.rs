//! In-memory asset tree

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

use super::{AssetEntry, AssetSource, split};

/// Asset tree held in memory
///
/// Directories are implied by the files placed in them and can also be
/// declared explicitly so that empty directories survive.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Cow<'static, [u8]>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory (and its ancestors)
    pub fn add_dir(&mut self, path: &str) {
        let mut current = path.trim_end_matches('/');
        while !current.is_empty() {
            self.dirs.insert(current.to_string());
            current = split(current).0;
        }
    }

    /// Add a file, creating its ancestors
    pub fn add_file(&mut self, path: &str, bytes: impl Into<Cow<'static, [u8]>>) {
        self.add_dir(split(path).0);
        self.files.insert(path.to_string(), bytes.into());
    }

    #[cfg(test)]
    pub fn with_file(mut self, path: &str, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        self.add_file(path, bytes);
        self
    }

    #[cfg(test)]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl AssetSource for MemoryAssets {
    fn read_dir(&self, dir: &str) -> io::Result<Vec<AssetEntry>> {
        if !dir.is_empty() && !self.dirs.contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such asset directory: {dir}"),
            ));
        }

        let children_dirs = self
            .dirs
            .iter()
            .filter(|path| split(path).0 == dir)
            .map(|path| AssetEntry::new(dir, split(path).1, true));
        let children_files = self
            .files
            .keys()
            .filter(|path| split(path).0 == dir)
            .map(|path| AssetEntry::new(dir, split(path).1, false));

        let mut entries: Vec<AssetEntry> = children_dirs.chain(children_files).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(&self, path: &str) -> io::Result<Cow<'static, [u8]>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such asset file: {path}"),
            )
        })
    }
}
