//! Asset tree read from a directory on disk (`--assets <DIR>`)

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{AssetEntry, AssetSource};

/// Asset tree rooted at a directory on disk
///
/// Symbolic links are never descended into. A link to a regular file is
/// deployed with the file's content; any other link is skipped.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, rooted: &str) -> PathBuf {
        self.root.join(rooted.trim_start_matches('/'))
    }
}

impl AssetSource for DirAssets {
    fn read_dir(&self, dir: &str) -> io::Result<Vec<AssetEntry>> {
        let root = self.resolve(dir);
        if !fs::metadata(&root)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            ));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                entries.push(AssetEntry::new(dir, &name, true));
            } else if file_type.is_file() || links_to_file(entry.path()) {
                entries.push(AssetEntry::new(dir, &name, false));
            } else {
                debug!("skipping {}: not a regular file or directory", entry.path().display());
            }
        }
        Ok(entries)
    }

    fn read_file(&self, path: &str) -> io::Result<Cow<'static, [u8]>> {
        fs::read(self.resolve(path)).map(Cow::Owned)
    }
}

fn links_to_file(path: &Path) -> bool {
    path.is_symlink() && fs::metadata(path).is_ok_and(|m| m.is_file())
}
