//! Discovery of DRM render nodes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory the kernel exposes DRM nodes under.
pub const DRI_DIR: &str = "/dev/dri";

const RENDER_PREFIX: &str = "renderD";

/// Lists the render nodes under [`DRI_DIR`], ordered by minor number.
pub fn render_nodes() -> io::Result<Vec<PathBuf>> {
    render_nodes_in(DRI_DIR)
}

/// Lists `renderD<minor>` entries of `dir`, ordered by minor number.
///
/// Primary (`card*`) and control nodes are skipped: they need DRM master
/// or root, which a headless compute context never does.
pub fn render_nodes_in(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut nodes: Vec<(u32, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let minor = name.to_str()?.strip_prefix(RENDER_PREFIX)?.parse::<u32>().ok()?;
            Some((minor, entry.path()))
        })
        .collect();
    nodes.sort_by_key(|(minor, _)| *minor);
    Ok(nodes.into_iter().map(|(_, path)| path).collect())
}
