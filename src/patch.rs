//! Line-level patching of host configuration files
//!
//! A [`FilePatch`] loads a file through a [`TargetFs`], edits it in memory and
//! writes it back only when something changed. A file that does not exist is
//! not an error: edits against it are no-ops unless content is created with
//! [`FilePatch::create_if_missing`].

use std::io;

use regex::Regex;
use tracing::debug;

use crate::assets::perms::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use crate::deploy::TargetFs;
use crate::error::{HostprepError, Result};

/// Pending edits to one configuration file
#[derive(Debug, Clone)]
pub struct FilePatch {
    path: String,
    content: String,
    exists: bool,
    mode: u32,
    dirty: bool,
}

impl FilePatch {
    /// Load `path` for editing
    ///
    /// Only read errors other than "not found" are returned.
    pub fn open(target: &dyn TargetFs, path: &str) -> Result<Self> {
        let (content, exists) = match target.read_file(path) {
            Ok(bytes) => (String::from_utf8_lossy(&bytes).into_owned(), true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (String::new(), false),
            Err(e) => {
                return Err(HostprepError::FileReadFailed {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        Ok(Self {
            path: path.to_string(),
            content,
            exists,
            mode: target.file_mode(path).unwrap_or(DEFAULT_FILE_MODE),
            dirty: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    #[cfg(test)]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace every line matching `pattern` with `line`
    ///
    /// `pattern` is compiled in multi-line mode, so `^`/`$` anchor on lines.
    /// Returns whether anything matched; nothing is added when nothing did.
    pub fn replace_line(&mut self, pattern: &str, line: &str) -> Result<bool> {
        let re = compile(pattern)?;
        if !re.is_match(&self.content) {
            debug!("{}: no line matches {pattern}", self.path);
            return Ok(false);
        }

        let replaced = re.replace_all(&self.content, regex::NoExpand(line)).into_owned();
        self.update(replaced);
        Ok(true)
    }

    /// Set `KEY=value` style settings, uncommenting a `#KEY=` line if present
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<bool> {
        self.replace_line(
            &format!(r"^#?{}=.*$", regex::escape(key)),
            &format!("{key}={value}"),
        )
    }

    /// Comment out active `KEY=` lines, keeping their values
    pub fn comment_out(&mut self, key: &str) -> Result<bool> {
        let prefix = format!("{key}=");
        let re = compile(&format!("^{}", regex::escape(&prefix)))?;
        if !re.is_match(&self.content) {
            return Ok(false);
        }

        let commented = format!("#{prefix}");
        let replaced = re
            .replace_all(&self.content, regex::NoExpand(&commented))
            .into_owned();
        self.update(replaced);
        Ok(true)
    }

    /// Replace the (possibly commented) line starting with `key`, or append
    /// `line` when there is none
    ///
    /// Used for whitespace-separated settings such as `ScanOnAccess yes`.
    /// Appending to a missing file is skipped.
    pub fn set_or_append(&mut self, key: &str, line: &str) -> Result<()> {
        let pattern = format!(r"^#?{}(?:[ \t].*)?$", regex::escape(key));
        if self.replace_line(&pattern, line)? || !self.exists {
            return Ok(());
        }

        let mut content = std::mem::take(&mut self.content);
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(line);
        content.push('\n');
        self.update(content);
        Ok(())
    }

    /// Give a missing file `content`; existing files are left alone
    pub fn create_if_missing(&mut self, content: &str) -> bool {
        if self.exists {
            return false;
        }
        self.content = content.to_string();
        self.exists = true;
        self.dirty = true;
        true
    }

    /// Write the file back if it changed, keeping its mode
    ///
    /// Missing parent directories are created. Returns whether anything was
    /// written.
    pub fn save(&mut self, target: &dyn TargetFs) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        let write_failed = |e: io::Error| HostprepError::FileWriteFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        if let Some((parent, _)) = self.path.rsplit_once('/') {
            target
                .create_dir_all(parent, DEFAULT_DIR_MODE)
                .map_err(write_failed)?;
        }
        target
            .write_file(&self.path, self.content.as_bytes(), self.mode)
            .map_err(write_failed)?;
        self.dirty = false;
        debug!("patched {}", self.path);
        Ok(true)
    }

    fn update(&mut self, content: String) {
        if content != self.content {
            self.content = content;
            self.dirty = true;
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("(?m){pattern}")).map_err(|e| HostprepError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::LiveFs;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const RESOLVED: &str = "[Resolve]\n#DNS=\n#FallbackDNS=\n#DNSSEC=no\n#Cache=no-negative\n";

    fn setup(name: &str, content: &str) -> (TempDir, LiveFs) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(name), content).unwrap();
        let live = LiveFs::new(temp.path());
        (temp, live)
    }

    #[test]
    fn test_set_key_uncomments_and_replaces() {
        let (temp, live) = setup("resolved.conf", RESOLVED);
        let mut patch = FilePatch::open(&live, "/resolved.conf").unwrap();

        assert!(patch.set_key("DNSSEC", "yes").unwrap());
        assert!(patch.set_key("Cache", "yes").unwrap());
        assert!(patch.save(&live).unwrap());

        let written = fs::read_to_string(temp.path().join("resolved.conf")).unwrap();
        assert!(written.contains("\nDNSSEC=yes\n"));
        assert!(written.contains("\nCache=yes\n"));
        assert!(written.contains("#DNS=\n"));
    }

    #[test]
    fn test_replace_line_without_match_appends_nothing() {
        let (_temp, live) = setup("resolved.conf", RESOLVED);
        let mut patch = FilePatch::open(&live, "/resolved.conf").unwrap();

        assert!(!patch.set_key("DNSOverTLS", "yes").unwrap());
        assert_eq!(patch.content(), RESOLVED);
        assert!(!patch.save(&live).unwrap());
    }

    #[test]
    fn test_replacement_is_literal() {
        let (_temp, live) = setup("resolved.conf", "#Domains=\n");
        let mut patch = FilePatch::open(&live, "/resolved.conf").unwrap();

        patch
            .set_key("Domains", "security.cloudflare-dns.com?ip=1.1.1.2&name=$1")
            .unwrap();
        assert_eq!(
            patch.content(),
            "Domains=security.cloudflare-dns.com?ip=1.1.1.2&name=$1\n"
        );
    }

    #[test]
    fn test_comment_out_keeps_value() {
        let (_temp, live) = setup("resolved.conf", "DNSSEC=allow-downgrade\n#DNSSEC=no\n");
        let mut patch = FilePatch::open(&live, "/resolved.conf").unwrap();

        assert!(patch.comment_out("DNSSEC").unwrap());
        assert_eq!(patch.content(), "#DNSSEC=allow-downgrade\n#DNSSEC=no\n");
        assert!(!patch.comment_out("DNSSEC").unwrap());
    }

    #[test]
    fn test_set_or_append() {
        let (temp, live) = setup("scan.conf", "#ScanOnAccess yes\nUser clamscan");
        let mut patch = FilePatch::open(&live, "/scan.conf").unwrap();

        patch.set_or_append("ScanOnAccess", "ScanOnAccess yes").unwrap();
        patch.set_or_append("User", "User root").unwrap();
        patch.set_or_append("OnAccessMountPath", "OnAccessMountPath /").unwrap();
        patch.save(&live).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("scan.conf")).unwrap(),
            "ScanOnAccess yes\nUser root\nOnAccessMountPath /\n"
        );
    }

    #[test]
    fn test_set_or_append_is_idempotent() {
        let (_temp, live) = setup("scan.conf", "");
        let mut patch = FilePatch::open(&live, "/scan.conf").unwrap();

        patch.set_or_append("OnAccessExcludeUID", "OnAccessExcludeUID 0").unwrap();
        patch.set_or_append("OnAccessExcludeUID", "OnAccessExcludeUID 0").unwrap();
        assert_eq!(patch.content(), "OnAccessExcludeUID 0\n");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let live = LiveFs::new(temp.path());
        let mut patch = FilePatch::open(&live, "/etc/clamd.d/scan.conf").unwrap();

        assert!(!patch.exists());
        patch.set_or_append("User", "User root").unwrap();
        assert!(!patch.save(&live).unwrap());
        assert!(!temp.path().join("etc").exists());
    }

    #[test]
    fn test_create_if_missing() {
        let temp = TempDir::new().unwrap();
        let live = LiveFs::new(temp.path());

        let mut patch = FilePatch::open(&live, "/jail.local").unwrap();
        assert!(patch.create_if_missing("[DEFAULT]\n"));
        assert!(patch.save(&live).unwrap());

        let path = temp.path().join("jail.local");
        assert_eq!(fs::read_to_string(&path).unwrap(), "[DEFAULT]\n");
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o777,
            DEFAULT_FILE_MODE
        );

        let mut again = FilePatch::open(&live, "/jail.local").unwrap();
        assert!(!again.create_if_missing("[sshd]\n"));
        assert!(!again.save(&live).unwrap());
    }

    #[test]
    fn test_create_if_missing_creates_parents() {
        let temp = TempDir::new().unwrap();
        let live = LiveFs::new(temp.path());

        let mut patch = FilePatch::open(&live, "/etc/fail2ban/jail.local").unwrap();
        patch.create_if_missing("[sshd]\nenabled = true\n");
        patch.save(&live).unwrap();

        assert!(temp.path().join("etc/fail2ban/jail.local").is_file());
    }

    #[test]
    fn test_save_keeps_existing_mode() {
        let (temp, live) = setup("automatic.conf", "apply_updates = no\n");
        let path = temp.path().join("automatic.conf");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let mut patch = FilePatch::open(&live, "/automatic.conf").unwrap();
        patch
            .replace_line(r"^#?apply_updates\s*=.*$", "apply_updates = yes")
            .unwrap();
        patch.save(&live).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "apply_updates = yes\n");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_invalid_pattern() {
        let (_temp, live) = setup("x", "");
        let mut patch = FilePatch::open(&live, "/x").unwrap();
        let err = patch.replace_line("(unclosed", "y").unwrap_err();
        assert!(matches!(err, HostprepError::InvalidPattern { .. }));
    }
}
