//! Permission overrides from the tree's `.perms.json`
//!
//! Keys are destination paths, values are either octal strings (`"0600"`)
//! or numeric modes (`384`). Anything unreadable or invalid falls back to the
//! default file mode.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::{AssetSource, PERMS_FILE};

/// Mode for files without an override
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Mode carried down from the tree root to directories that do not exist yet
pub const DEFAULT_DIR_MODE: u32 = 0o755;

const MAX_MODE: u32 = 0o7777;

/// Resolved per-path file modes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTable {
    modes: HashMap<String, u32>,
}

impl PermissionTable {
    /// Read the permission table from an asset tree
    ///
    /// A missing or malformed table yields an empty one.
    pub fn load(source: &dyn AssetSource) -> Self {
        match source.read_file(PERMS_FILE) {
            Ok(bytes) => Self::from_json(&bytes),
            Err(e) => {
                debug!("no permission table in asset tree: {e}");
                Self::default()
            }
        }
    }

    pub fn from_json(bytes: &[u8]) -> Self {
        let parsed: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!("ignoring malformed {PERMS_FILE}: {e}");
                return Self::default();
            }
        };

        let Value::Object(entries) = parsed else {
            warn!("ignoring {PERMS_FILE}: expected a JSON object");
            return Self::default();
        };

        let mut modes = HashMap::new();
        for (path, value) in entries {
            match parse_mode(&value) {
                Some(mode) => {
                    modes.insert(path, mode);
                }
                None => warn!("ignoring invalid mode {value} for {path}"),
            }
        }

        Self { modes }
    }

    /// Mode for the file at `path`, or the default file mode
    pub fn mode_for(&self, path: &str) -> u32 {
        self.modes.get(path).copied().unwrap_or(DEFAULT_FILE_MODE)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

fn parse_mode(value: &Value) -> Option<u32> {
    let mode = match value {
        Value::String(text) => {
            let digits = text.trim().trim_start_matches("0o");
            u32::from_str_radix(digits, 8).ok()?
        }
        Value::Number(number) => u32::try_from(number.as_u64()?).ok()?,
        _ => return None,
    };

    (mode <= MAX_MODE).then_some(mode)
}
