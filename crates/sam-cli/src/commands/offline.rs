//! Commands that run without a daemon.

use anyhow::{Context, Result};
use sam_broker::registry;
use sam_loader::ManifestLoader;

use super::{parse_kind, read_manifest_file};

/// `sam validate -f FILE [--kind K]`
pub fn validate(file: &str, kind: Option<&str>) -> Result<()> {
    let text = read_manifest_file(file)?;
    let mut loader = ManifestLoader::new();
    if let Some(k) = kind {
        loader = loader.expect_kind(parse_kind(k)?);
    }
    let loaded = loader
        .load_str(&text)
        .with_context(|| format!("INVALID_MANIFEST file={file}"))?;
    let m = &loaded.manifest;
    println!(
        "valid=true kind={} name={} version={} format={}",
        m.kind(),
        m.name(),
        m.metadata().version(),
        loaded.format
    );
    Ok(())
}

/// `sam example KIND [--json]`
pub fn example(kind: &str, json: bool) -> Result<()> {
    let kind = parse_kind(kind)?;
    let manifest = registry::global().example_manifest(kind)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&manifest.to_value())?);
    } else {
        print!("{}", manifest.to_yaml());
    }
    Ok(())
}

/// `sam config-hash PATHS...`
pub fn config_hash(paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = sam_config::load_layered_yaml(&path_refs)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}
