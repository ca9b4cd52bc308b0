//! Destination filesystems for asset deployment

use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use console::Style;

/// Where deployed files and patched config files land
///
/// Paths are rooted asset paths (`/etc/app/conf`); implementations decide
/// what they are relative to.
pub trait TargetFs {
    /// Permission bits of the directory at `path`, if it already exists
    fn dir_mode(&self, path: &str) -> Option<u32>;

    /// Permission bits of the regular file at `path`, if it exists
    fn file_mode(&self, path: &str) -> Option<u32>;

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Create `path` and any missing ancestors with `mode`
    ///
    /// Succeeds if the directory already exists; existing directories keep
    /// their mode.
    fn create_dir_all(&self, path: &str, mode: u32) -> io::Result<()>;

    /// Create or truncate-and-replace the file at `path`, then set its mode
    fn write_file(&self, path: &str, bytes: &[u8], mode: u32) -> io::Result<()>;
}

/// The real filesystem below a root directory (`/` outside of tests)
#[derive(Debug, Clone)]
pub struct LiveFs {
    root: PathBuf,
}

impl LiveFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, rooted: &str) -> PathBuf {
        self.root.join(rooted.trim_start_matches('/'))
    }
}

impl TargetFs for LiveFs {
    fn dir_mode(&self, path: &str) -> Option<u32> {
        fs::metadata(self.resolve(path))
            .ok()
            .filter(fs::Metadata::is_dir)
            .map(|meta| meta.permissions().mode() & 0o777)
    }

    fn file_mode(&self, path: &str) -> Option<u32> {
        fs::metadata(self.resolve(path))
            .ok()
            .filter(fs::Metadata::is_file)
            .map(|meta| meta.permissions().mode() & 0o7777)
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn create_dir_all(&self, path: &str, mode: u32) -> io::Result<()> {
        let mut current = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current.push(component);
            create_dir_with_mode(&current, mode)?;
        }
        Ok(())
    }

    fn write_file(&self, path: &str, bytes: &[u8], mode: u32) -> io::Result<()> {
        let full_path = self.resolve(path);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(&full_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::set_permissions(&full_path, fs::Permissions::from_mode(mode))
    }
}

/// Create a single directory, leaving an existing one untouched
///
/// A new directory gets exactly `mode`, regardless of the process umask.
fn create_dir_with_mode(path: &Path, mode: u32) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    match DirBuilder::new().mode(mode).create(path) {
        Ok(()) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Reads directory modes from the live root but only reports writes
#[derive(Debug, Clone)]
pub struct DryRunFs {
    live: LiveFs,
}

impl DryRunFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            live: LiveFs::new(root),
        }
    }
}

impl TargetFs for DryRunFs {
    fn dir_mode(&self, path: &str) -> Option<u32> {
        self.live.dir_mode(path)
    }

    fn file_mode(&self, path: &str) -> Option<u32> {
        self.live.file_mode(path)
    }

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        self.live.read_file(path)
    }

    fn create_dir_all(&self, _path: &str, _mode: u32) -> io::Result<()> {
        Ok(())
    }

    fn write_file(&self, path: &str, bytes: &[u8], mode: u32) -> io::Result<()> {
        println!(
            "{} {} ({} bytes, mode {:04o})",
            Style::new().bold().cyan().apply_to("would write"),
            self.live.resolve(path).display(),
            bytes.len(),
            mode
        );
        Ok(())
    }
}
