//! Command handler modules for the `sam` CLI.
//!
//! `offline` commands never touch the network; `remote` commands talk to a
//! running sam-daemon. Shared helpers live here.

pub mod offline;
pub mod remote;

use anyhow::{Context, Result};
use sam_broker::{registry, Kind};

/// Resolve a kind given as canonical name or URL slug (`SqlPlugin`,
/// `sqlplugin`, `sqlplugins`).
pub fn parse_kind(raw: &str) -> Result<Kind> {
    registry::global()
        .resolve_slug(raw)
        .with_context(|| format!("invalid kind '{raw}'"))
}

/// Manifest files may carry a UTF-8 BOM when written on Windows.
pub fn read_manifest_file(path: &str) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("read manifest failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    String::from_utf8(bytes.to_vec()).context("manifest must be UTF-8 text")
}
