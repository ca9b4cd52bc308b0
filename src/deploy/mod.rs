//! Asset deployment onto the host
//!
//! Deployment is a two-pass walk over the same asset tree:
//!
//! 1. [`Deployer::count_files`] grows the progress total by one per file.
//! 2. [`Deployer::install`] resolves every file into a [`WriteInstruction`]
//!    ([`Deployer::plan`]) and then performs the writes ([`Deployer::apply`]),
//!    stepping the progress once per file.
//!
//! Both passes skip entries whose name starts with `.`, so they always agree
//! on the number of files.
//!
//! Deployment is best-effort: an unreadable asset directory contributes no
//! files, and a failed write is reported in the [`DeployReport`] without
//! stopping the remaining writes.

pub mod target;

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::assets::perms::DEFAULT_DIR_MODE;
use crate::assets::{AssetSource, PermissionTable};
use crate::progress::ProgressTracker;

pub use target::{DryRunFs, LiveFs, TargetFs};

/// One resolved file write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteInstruction {
    /// Destination path of the file
    pub path: String,
    /// Directory containing the file
    pub dir: String,
    /// Mode used for `dir` and its ancestors if they have to be created
    pub dir_mode: u32,
    /// Mode the file ends up with
    pub mode: u32,
    pub bytes: Cow<'static, [u8]>,
}

/// A file that could not be deployed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployFailure {
    pub path: String,
    pub reason: String,
}

/// Resolved deployment, before anything is written
#[derive(Debug, Clone, Default)]
pub struct DeployPlan {
    pub writes: Vec<WriteInstruction>,
    /// Files listed in the tree whose content could not be read
    pub unreadable: Vec<DeployFailure>,
}

impl DeployPlan {
    /// Number of progress steps applying this plan takes
    fn len(&self) -> usize {
        self.writes.len() + self.unreadable.len()
    }
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub written: usize,
    pub failures: Vec<DeployFailure>,
}

/// Walks an asset tree and deploys it onto a [`TargetFs`]
pub struct Deployer<'a> {
    source: &'a dyn AssetSource,
    perms: PermissionTable,
}

impl<'a> Deployer<'a> {
    /// Create a deployer, reading the tree's permission table once
    pub fn new(source: &'a dyn AssetSource) -> Self {
        Self {
            source,
            perms: PermissionTable::load(source),
        }
    }

    /// Count pass: grow the progress total by one for every deployable file
    ///
    /// Returns the number of files counted. Never touches the destination.
    pub fn count_files(&self, tracker: &ProgressTracker) -> u64 {
        self.count_in("", tracker)
    }

    fn count_in(&self, dir: &str, tracker: &ProgressTracker) -> u64 {
        let entries = match self.source.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("not counting unreadable asset directory {dir:?}: {e}");
                return 0;
            }
        };

        let mut count = 0;
        for entry in entries.iter().filter(|e| !e.is_hidden()) {
            if entry.is_dir {
                count += self.count_in(&entry.path, tracker);
            } else {
                tracker.add_size(1);
                count += 1;
            }
        }
        count
    }

    /// Resolve every deployable file into a write instruction
    ///
    /// A directory that already exists on `target` passes its current mode
    /// down to the files and new subdirectories below it; otherwise the mode
    /// carried from its parent is used, starting from [`DEFAULT_DIR_MODE`].
    pub fn plan(&self, target: &dyn TargetFs) -> DeployPlan {
        let mut plan = DeployPlan::default();
        self.plan_dir("", DEFAULT_DIR_MODE, target, &mut plan);
        plan
    }

    fn plan_dir(&self, dir: &str, dir_mode: u32, target: &dyn TargetFs, plan: &mut DeployPlan) {
        let entries = match self.source.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("skipping unreadable asset directory {dir:?}: {e}");
                return;
            }
        };

        for entry in entries.into_iter().filter(|e| !e.is_hidden()) {
            if entry.is_dir {
                let child_mode = target.dir_mode(&entry.path).unwrap_or(dir_mode);
                self.plan_dir(&entry.path, child_mode, target, plan);
                continue;
            }

            match self.source.read_file(&entry.path) {
                Ok(bytes) => plan.writes.push(WriteInstruction {
                    mode: self.perms.mode_for(&entry.path),
                    path: entry.path,
                    dir: dir.to_string(),
                    dir_mode,
                    bytes,
                }),
                Err(e) => plan.unreadable.push(DeployFailure {
                    path: entry.path,
                    reason: e.to_string(),
                }),
            }
        }
    }

    /// Perform the writes of `plan`, stepping `tracker` once per file
    pub fn apply(
        &self,
        plan: DeployPlan,
        target: &dyn TargetFs,
        tracker: &ProgressTracker,
    ) -> DeployReport {
        let mut report = DeployReport::default();
        debug!("installing {} asset files", plan.len());

        for write in plan.writes {
            let result = target
                .create_dir_all(&write.dir, write.dir_mode)
                .and_then(|()| target.write_file(&write.path, &write.bytes, write.mode));

            match result {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!("failed to install {}: {e}", write.path);
                    report.failures.push(DeployFailure {
                        path: write.path,
                        reason: e.to_string(),
                    });
                }
            }
            tracker.step();
        }

        for failure in plan.unreadable {
            warn!("failed to read asset {}: {}", failure.path, failure.reason);
            report.failures.push(failure);
            tracker.step();
        }

        report
    }

    /// Install pass: plan and apply in one go
    pub fn install(&self, target: &dyn TargetFs, tracker: &ProgressTracker) -> DeployReport {
        let plan = self.plan(target);
        self.apply(plan, target, tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetEntry, MemoryAssets};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::io;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    fn app_assets() -> MemoryAssets {
        MemoryAssets::new()
            .with_file("/.perms.json", br#"{"/etc/app/conf": "0600"}"#.as_slice())
            .with_file("/etc/app/conf", b"secret=1\n".as_slice())
            .with_file("/etc/app/readme", b"hello\n".as_slice())
    }

    /// Asset tree whose listing of one directory always fails
    struct BrokenDir {
        inner: MemoryAssets,
        broken: &'static str,
    }

    impl AssetSource for BrokenDir {
        fn read_dir(&self, dir: &str) -> io::Result<Vec<AssetEntry>> {
            if dir == self.broken {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.inner.read_dir(dir)
        }

        fn read_file(&self, path: &str) -> io::Result<Cow<'static, [u8]>> {
            self.inner.read_file(path)
        }
    }

    /// In-memory destination recording what would be on disk
    #[derive(Default)]
    struct MemoryFs {
        dirs: RefCell<HashMap<String, u32>>,
        files: RefCell<HashMap<String, (Vec<u8>, u32)>>,
        fail_on: Option<&'static str>,
    }

    impl TargetFs for MemoryFs {
        fn dir_mode(&self, path: &str) -> Option<u32> {
            self.dirs.borrow().get(path).copied()
        }

        fn file_mode(&self, path: &str) -> Option<u32> {
            self.files.borrow().get(path).map(|(_, mode)| *mode)
        }

        fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
            self.files
                .borrow()
                .get(path)
                .map(|(bytes, _)| bytes.clone())
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn create_dir_all(&self, path: &str, mode: u32) -> io::Result<()> {
            let mut current = String::new();
            for component in path.split('/').filter(|c| !c.is_empty()) {
                current.push('/');
                current.push_str(component);
                self.dirs.borrow_mut().entry(current.clone()).or_insert(mode);
            }
            Ok(())
        }

        fn write_file(&self, path: &str, bytes: &[u8], mode: u32) -> io::Result<()> {
            if self.fail_on == Some(path) {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            self.files
                .borrow_mut()
                .insert(path.to_string(), (bytes.to_vec(), mode));
            Ok(())
        }
    }

    #[test]
    fn test_existing_dir_mode_and_overrides() {
        let temp = TempDir::new().unwrap();
        let app_dir = temp.path().join("etc/app");
        fs::create_dir_all(&app_dir).unwrap();
        fs::set_permissions(&app_dir, fs::Permissions::from_mode(0o750)).unwrap();

        let assets = app_assets();
        let deployer = Deployer::new(&assets);
        let tracker = ProgressTracker::hidden();
        let report = deployer.install(&LiveFs::new(temp.path()), &tracker);

        assert_eq!(report.written, 2);
        assert!(report.failures.is_empty());
        assert_eq!(mode_of(&app_dir.join("conf")), 0o600);
        assert_eq!(mode_of(&app_dir.join("readme")), 0o644);
        assert_eq!(mode_of(&app_dir), 0o750);
        assert_eq!(fs::read_to_string(app_dir.join("conf")).unwrap(), "secret=1\n");
    }

    #[test]
    fn test_plan_inherits_existing_dir_mode() {
        let target = MemoryFs::default();
        target.dirs.borrow_mut().insert("/opt".to_string(), 0o700);

        let assets = MemoryAssets::new()
            .with_file("/opt/tool/sub/file", b"x".as_slice())
            .with_file("/srv/new/file", b"y".as_slice());
        let plan = Deployer::new(&assets).plan(&target);

        let by_path: HashMap<&str, &WriteInstruction> =
            plan.writes.iter().map(|w| (w.path.as_str(), w)).collect();
        assert_eq!(by_path["/opt/tool/sub/file"].dir_mode, 0o700);
        assert_eq!(by_path["/opt/tool/sub/file"].dir, "/opt/tool/sub");
        assert_eq!(by_path["/srv/new/file"].dir_mode, DEFAULT_DIR_MODE);
    }

    #[test]
    fn test_sibling_dirs_do_not_leak_modes() {
        let target = MemoryFs::default();
        target.dirs.borrow_mut().insert("/a".to_string(), 0o700);

        let assets = MemoryAssets::new()
            .with_file("/a/file", b"x".as_slice())
            .with_file("/b/file", b"y".as_slice());
        let plan = Deployer::new(&assets).plan(&target);

        assert_eq!(plan.writes[0].path, "/a/file");
        assert_eq!(plan.writes[0].dir_mode, 0o700);
        assert_eq!(plan.writes[1].path, "/b/file");
        assert_eq!(plan.writes[1].dir_mode, DEFAULT_DIR_MODE);
    }

    #[test]
    fn test_new_dirs_created_with_resolved_mode() {
        let temp = TempDir::new().unwrap();
        let opt = temp.path().join("opt");
        fs::create_dir_all(&opt).unwrap();
        fs::set_permissions(&opt, fs::Permissions::from_mode(0o700)).unwrap();

        let assets = MemoryAssets::new()
            .with_file("/opt/tool/bin", b"x".as_slice())
            .with_file("/srv/data/file", b"y".as_slice());
        let tracker = ProgressTracker::hidden();
        Deployer::new(&assets).install(&LiveFs::new(temp.path()), &tracker);

        assert_eq!(mode_of(&opt.join("tool")), 0o700);
        assert_eq!(mode_of(&temp.path().join("srv")), 0o755);
        assert_eq!(mode_of(&temp.path().join("srv/data")), 0o755);
    }

    #[test]
    fn test_hidden_entries_never_written() {
        let temp = TempDir::new().unwrap();
        let assets = app_assets()
            .with_file("/etc/.hidden", b"x".as_slice())
            .with_file("/etc/.git/config", b"y".as_slice());

        let tracker = ProgressTracker::hidden();
        let report = Deployer::new(&assets).install(&LiveFs::new(temp.path()), &tracker);

        assert_eq!(report.written, 2);
        assert!(!temp.path().join(".perms.json").exists());
        assert!(!temp.path().join("etc/.hidden").exists());
        assert!(!temp.path().join("etc/.git").exists());
    }

    #[test]
    fn test_count_matches_install_steps() {
        let temp = TempDir::new().unwrap();
        let assets = app_assets()
            .with_file("/usr/local/bin/tool", b"#!/bin/sh\n".as_slice())
            .with_file("/etc/.skip", b"x".as_slice());
        let deployer = Deployer::new(&assets);

        let tracker = ProgressTracker::hidden();
        let counted = deployer.count_files(&tracker);
        assert_eq!(counted, 3);
        assert_eq!(tracker.size(), 3);

        deployer.install(&LiveFs::new(temp.path()), &tracker);
        assert_eq!(tracker.position(), tracker.size());
    }

    #[test]
    fn test_install_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let assets = app_assets();
        let deployer = Deployer::new(&assets);
        let live = LiveFs::new(temp.path());
        let tracker = ProgressTracker::hidden();

        deployer.install(&live, &tracker);
        let conf = temp.path().join("etc/app/conf");
        let first = (fs::read(&conf).unwrap(), mode_of(&conf));

        fs::write(&conf, "tampered with a longer body\n").unwrap();
        fs::set_permissions(&conf, fs::Permissions::from_mode(0o666)).unwrap();

        let report = deployer.install(&live, &tracker);
        let second = (fs::read(&conf).unwrap(), mode_of(&conf));

        assert!(report.failures.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_unreadable_subtree_is_skipped() {
        let temp = TempDir::new().unwrap();
        let assets = BrokenDir {
            inner: app_assets().with_file("/opt/broken/file", b"x".as_slice()),
            broken: "/opt/broken",
        };
        let deployer = Deployer::new(&assets);

        let tracker = ProgressTracker::hidden();
        assert_eq!(deployer.count_files(&tracker), 2);

        let report = deployer.install(&LiveFs::new(temp.path()), &tracker);
        assert_eq!(report.written, 2);
        assert!(report.failures.is_empty());
        assert!(!temp.path().join("opt/broken/file").exists());
        assert_eq!(tracker.position(), tracker.size());
    }

    #[test]
    fn test_write_failure_is_reported_and_run_continues() {
        let target = MemoryFs {
            fail_on: Some("/etc/app/conf"),
            ..MemoryFs::default()
        };
        let assets = app_assets();
        let deployer = Deployer::new(&assets);
        let tracker = ProgressTracker::hidden();
        deployer.count_files(&tracker);

        let report = deployer.install(&target, &tracker);

        assert_eq!(report.written, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "/etc/app/conf");
        assert!(report.failures[0].reason.contains("disk full"));
        assert!(target.files.borrow().contains_key("/etc/app/readme"));
        assert_eq!(tracker.position(), 2);
    }

    #[test]
    fn test_live_write_failure_when_path_is_a_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("etc/app/conf")).unwrap();

        let assets = app_assets();
        let tracker = ProgressTracker::hidden();
        let report = Deployer::new(&assets).install(&LiveFs::new(temp.path()), &tracker);

        assert_eq!(report.written, 1);
        assert_eq!(report.failures[0].path, "/etc/app/conf");
        assert!(temp.path().join("etc/app/readme").exists());
    }

    #[test]
    fn test_plan_resolves_modes_without_touching_disk() {
        let target = MemoryFs::default();
        let assets = app_assets();
        let plan = Deployer::new(&assets).plan(&target);

        assert_eq!(plan.len(), 2);
        let modes: Vec<(&str, u32)> = plan
            .writes
            .iter()
            .map(|w| (w.path.as_str(), w.mode))
            .collect();
        assert_eq!(modes, [("/etc/app/conf", 0o600), ("/etc/app/readme", 0o644)]);
        assert!(target.files.borrow().is_empty());
    }
}
