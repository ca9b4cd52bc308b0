use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const ASSET_ROOT: &str = "assets/fs";

fn main() {
    let manifest_dir =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR must be set"));
    let asset_root = manifest_dir.join(ASSET_ROOT);

    println!("cargo:rerun-if-changed={ASSET_ROOT}");

    let generated = generate_embedded_source(&asset_root);
    fs::write(out_dir.join("embedded_assets_generated.rs"), generated)
        .expect("failed writing embedded asset table");
}

/// Emits the directory and file tables consumed by `assets::embedded`.
///
/// Paths are rooted at the asset tree: `assets/fs/etc/issue` becomes `/etc/issue`.
fn generate_embedded_source(asset_root: &Path) -> String {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    if asset_root.is_dir() {
        for entry in WalkDir::new(asset_root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            println!("cargo:rerun-if-changed={}", entry.path().display());

            let Ok(relative) = entry.path().strip_prefix(asset_root) else {
                continue;
            };
            let rooted = format!("/{}", relative.to_string_lossy().replace('\\', "/"));

            if entry.file_type().is_dir() {
                dirs.push(rooted);
            } else if entry.file_type().is_file() {
                files.push((rooted, entry.path().to_path_buf()));
            }
        }
    }

    let mut generated = String::new();
    generated.push_str("pub(crate) static EMBEDDED_DIRS: &[&str] = &[\n");
    for dir in &dirs {
        let _ = writeln!(generated, "    {dir:?},");
    }
    generated.push_str("];\n\n");

    generated.push_str("pub(crate) static EMBEDDED_FILES: &[(&str, &[u8])] = &[\n");
    for (rooted, source) in &files {
        let path_literal = format!("{:?}", source.to_string_lossy());
        let _ = writeln!(generated, "    ({rooted:?}, include_bytes!({path_literal})),");
    }
    generated.push_str("];\n");
    generated
}
