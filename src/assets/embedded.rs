//! The asset tree compiled into the binary from `assets/fs`

use super::MemoryAssets;

include!(concat!(env!("OUT_DIR"), "/embedded_assets_generated.rs"));

/// Build the embedded asset tree
pub fn embedded() -> MemoryAssets {
    let mut assets = MemoryAssets::new();
    for dir in EMBEDDED_DIRS {
        assets.add_dir(dir);
    }
    for (path, bytes) in EMBEDDED_FILES {
        assets.add_file(path, *bytes);
    }
    assets
}
