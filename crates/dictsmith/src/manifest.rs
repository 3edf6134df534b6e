use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use bidict_types::{LanguagePair, PairError};

/// JSON shape of the batch input: `{"por_eng": ["https://...", ...], ...}`.
/// A `BTreeMap` keeps job order deterministic.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RawManifest(BTreeMap<String, Vec<String>>);

/// One dictionary to build: a language pair and its corpus mirror URLs.
#[derive(Clone, Debug)]
pub struct BuildJob {
    pub pair: LanguagePair,
    pub sources: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest entry {entry:?}: {source}")]
    InvalidPair {
        entry: String,
        #[source]
        source: PairError,
    },
}

/// Load and validate the batch manifest. Every pair identifier is checked
/// here, before any fetch begins; a malformed identifier rejects the whole
/// batch as a configuration error.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Vec<BuildJob>, ManifestError> {
    parse_manifest(&fs::read_to_string(path)?)
}

pub fn parse_manifest(raw: &str) -> Result<Vec<BuildJob>, ManifestError> {
    let RawManifest(entries) = serde_json::from_str(raw)?;
    let mut jobs = Vec::with_capacity(entries.len());
    for (entry, sources) in entries {
        let pair = entry
            .parse()
            .map_err(|source| ManifestError::InvalidPair {
                entry: entry.clone(),
                source,
            })?;
        jobs.push(BuildJob { pair, sources });
    }
    Ok(jobs)
}
