//! Target files for `download -f`: a YAML document with a `targets:` list of URLs.
//!
//! ```yaml
//! targets:
//!   - https://conda.anaconda.org/conda-forge/linux-64/xtensor-0.24.0-hc021e02_0.tar.bz2
//!   - https://example.com/data.bin
//! ```
//!
//! Other top-level keys are ignored.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct TargetsFile {
    #[serde(default)]
    targets: Vec<String>,
}

/// URLs listed under `targets:` in `path`, in file order.
pub fn load_targets(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read targets file {}", path.display()))?;
    parse_targets(&text).with_context(|| format!("parse targets file {}", path.display()))
}

fn parse_targets(text: &str) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: TargetsFile = serde_yaml::from_str(text)?;
    Ok(file
        .targets
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}
