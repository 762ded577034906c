//! Ordering manifest support
//!
//! A manifest is a plain text file listing archive paths in the order their
//! bytes should be laid out. Lines may carry a `label:` prefix, which is
//! dropped. Every listed path also pulls its parent directories forward.

use crate::error::{IoResultExt, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Parse manifest text into root-relative paths, ancestors first
pub fn parse_manifest(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let entry = match line.find(':') {
            Some(idx) => &line[idx + 1..],
            None => line,
        };
        let entry = entry.trim();
        let entry = entry.strip_prefix('/').unwrap_or(entry);
        if entry.is_empty() {
            continue;
        }

        let mut prefix = String::new();
        for part in entry.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            out.push(prefix.clone());
        }
    }
    out
}

pub fn load_manifest(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).with_path(path)?;
    Ok(parse_manifest(&text))
}

/// Reorder `inputs` so that manifest paths come first
///
/// Manifest entries are resolved against `src` and kept only when present in
/// `inputs`. Duplicates keep their first position. Inputs the manifest does
/// not mention follow in their original order.
pub fn order_paths(src: &Path, inputs: &[PathBuf], manifest: &[String]) -> Vec<PathBuf> {
    let available: HashSet<&PathBuf> = inputs.iter().collect();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut ordered = Vec::with_capacity(inputs.len());

    let mut missing = 0usize;
    for entry in manifest {
        let candidate = src.join(entry);
        if !available.contains(&candidate) {
            missing += 1;
            continue;
        }
        if seen.insert(candidate.clone()) {
            ordered.push(candidate);
        }
    }
    if missing > 0 {
        warn!("{} ordering entries matched no input path", missing);
    }
    debug!("Ordering manifest placed {} of {} paths", ordered.len(), inputs.len());

    for path in inputs {
        if seen.insert(path.clone()) {
            ordered.push(path.clone());
        }
    }
    ordered
}
