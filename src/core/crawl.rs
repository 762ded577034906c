//! Directory crawling and entry classification
//!
//! The builder does not walk the filesystem itself. It takes an ordered list
//! of paths plus whatever metadata the crawler already gathered, and asks a
//! [`Classifier`] for the rest.

use crate::error::{AsarError, IoResultExt, Result};
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Link,
}

/// Kind and metadata of one crawled path
#[derive(Debug, Clone)]
pub struct Crawled {
    pub kind: EntryKind,
    pub metadata: Metadata,
}

impl Crawled {
    pub fn from_metadata(metadata: Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Link
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Crawled { kind, metadata }
    }
}

pub type CrawlMetadata = HashMap<PathBuf, Crawled>;

/// Source of kind and metadata for paths the crawler did not describe
pub trait Classifier {
    fn classify(&self, path: &Path) -> Result<Crawled>;
}

/// Classifies by `lstat`, so links are reported as links
#[derive(Debug, Clone, Copy, Default)]
pub struct FsClassifier;

impl Classifier for FsClassifier {
    fn classify(&self, path: &Path) -> Result<Crawled> {
        let metadata = std::fs::symlink_metadata(path).with_path(path)?;
        Ok(Crawled::from_metadata(metadata))
    }
}

/// True when any component of `rel` starts with `.`
pub fn has_dot_component(rel: &Path) -> bool {
    rel.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Walk `root` without following links
///
/// Paths come back sorted by file name within each directory, parents before
/// children. The root itself is not included. Unless `dot` is set, entries
/// whose name starts with `.` are skipped along with their whole subtree.
pub fn crawl(root: &Path, dot: bool) -> Result<(Vec<PathBuf>, CrawlMetadata)> {
    let mut paths = Vec::new();
    let mut metadata = CrawlMetadata::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|ent| {
            dot || ent.depth() == 0 || !ent.file_name().to_string_lossy().starts_with('.')
        });

    for ent in walker {
        let ent = ent.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let msg = e.to_string();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            AsarError::io(path, io)
        })?;
        if ent.depth() == 0 {
            continue;
        }

        let meta = ent.metadata().map_err(|e| {
            let msg = e.to_string();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            AsarError::io(ent.path(), io)
        })?;
        let path = ent.into_path();
        metadata.insert(path.clone(), Crawled::from_metadata(meta));
        paths.push(path);
    }

    debug!("Crawled {} entries under {}", paths.len(), root.display());
    Ok((paths, metadata))
}
