//! Fixture loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// A single fixture case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCase {
    /// Case identifier.
    pub name: String,
    /// Operation under test: `render` or `grow`.
    pub function: String,
    /// Which documented rule the case pins down.
    #[serde(default)]
    pub reference: String,
    /// Operation inputs.
    pub inputs: serde_json::Value,
    /// Expected output, compared as a string.
    pub expected_output: String,
}

/// Inputs of a `render` case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderInputs {
    pub format: String,
    /// `KIND:VALUE` specs, see [`crate::args`].
    #[serde(default)]
    pub args: Vec<String>,
}

/// Inputs of a `grow` case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowInputs {
    pub element_size: usize,
    pub targets: Vec<usize>,
    #[serde(default)]
    pub text: bool,
    #[serde(default)]
    pub initial_bytes: Option<usize>,
    #[serde(default)]
    pub maximum_bytes: Option<usize>,
}

/// A collection of fixture cases for one family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Schema version.
    pub version: String,
    /// Family name.
    pub family: String,
    /// UTC timestamp of capture.
    pub captured_at: String,
    pub cases: Vec<FixtureCase>,
}

impl FixtureSet {
    /// Load fixture set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize fixture set to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load fixture set from a file path.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| HarnessError::FixtureJson {
            path: path.to_owned(),
            source,
        })
    }
}

/// JSON fixture files at `path`: the file itself, or every `*.json` directly
/// inside a directory, sorted.
pub fn fixture_paths(path: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    let io = |source| HarnessError::Io {
        path: path.to_owned(),
        source,
    };
    if path.is_file() {
        return Ok(vec![path.to_owned()]);
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(io)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(HarnessError::NoFixtures(path.to_owned()));
    }
    Ok(paths)
}
