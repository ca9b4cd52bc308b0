//! The bundled file tree deployed onto the host
//!
//! Paths inside a tree are rooted strings: the root itself is `""`, its
//! children are `"/etc"`, `"/usr"`, and so on, so an asset path is also its
//! destination path on the host.
//!
//! Any entry whose name starts with `.` is never deployed. The permission
//! table `/.perms.json` relies on this to stay out of the host filesystem.

mod dir;
mod embedded;
mod memory;
pub mod perms;

use std::borrow::Cow;
use std::io;

pub use dir::DirAssets;
pub use embedded::embedded;
pub use memory::MemoryAssets;
pub use perms::PermissionTable;

/// Rooted path of the permission override table
pub const PERMS_FILE: &str = "/.perms.json";

/// One file or directory inside an asset tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    /// Final path component
    pub name: String,
    /// Rooted path, always starting with `/`
    pub path: String,
    pub is_dir: bool,
}

impl AssetEntry {
    pub fn new(dir: &str, name: &str, is_dir: bool) -> Self {
        Self {
            name: name.to_string(),
            path: join(dir, name),
            is_dir,
        }
    }

    /// Whether this entry is excluded from counting and deployment
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Read-only access to an asset tree
pub trait AssetSource {
    /// List the direct children of `dir`, sorted by name
    fn read_dir(&self, dir: &str) -> io::Result<Vec<AssetEntry>>;

    /// Raw bytes of the file at `path`
    fn read_file(&self, path: &str) -> io::Result<Cow<'static, [u8]>>;
}

/// Join a rooted directory and a child name
pub fn join(dir: &str, name: &str) -> String {
    format!("{dir}/{name}")
}

/// Split a rooted path into its parent directory and final component
pub fn split(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}
