//! # asar-rs - Directory Archives with a JSON Header
//!
//! Packs a directory tree into one file and reads it back. An archive is a
//! small binary frame around a JSON header, followed by the contents of
//! every packed file back to back:
//!
//! - **Offsets** address each file inside the packed region
//! - **Integrity records** hold SHA-256 digests per file and per 4 MiB block
//! - **Unpacked entries** stay on disk in a sibling `<archive>.unpacked/`
//! - **Links** are stored relative to the archive root and never escape it
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asar_rs::{HeaderCache, PackOptions, Result};
//! use std::path::Path;
//!
//! # fn main() -> Result<()> {
//! let options = PackOptions::new().with_unpack("*.node");
//! asar_rs::pack(Path::new("app"), Path::new("app.asar"), &options)?;
//!
//! let mut cache = HeaderCache::new();
//! for path in asar_rs::list_package(&mut cache, Path::new("app.asar"), false)? {
//!     println!("{}", path);
//! }
//!
//! let main = asar_rs::extract_file(&mut cache, Path::new("app.asar"), "index.js", true)?;
//! # let _ = main;
//! # Ok(())
//! # }
//! ```
//!
//! Headers are parsed once per [`HeaderCache`]. Rewriting an archive that a
//! cache already holds requires [`HeaderCache::invalidate`].

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    builder, cache, config, crawl, error, header, integrity, namespace, ordering, paths, pickle,
    platform, reader, unpack,
};

pub use crate::core::{
    builder::pack_with_classifier,
    cache::HeaderCache,
    config::PackOptions,
    crawl::{crawl, Classifier, CrawlMetadata, Crawled, EntryKind, FsClassifier},
    error::{AsarError, CodecError, Result},
    header::ArchiveHeader,
    integrity::{compute_integrity, file_integrity, FileIntegrity},
    namespace::{DirectoryEntry, FileEntry, LinkEntry, Namespace, Node},
    pickle::{Pickle, PickleIterator},
    reader::Archive,
};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Crawl `src` and write the archive to `dest`
///
/// Returns the namespace that was written as the header.
pub fn pack(src: &Path, dest: &Path, options: &PackOptions) -> Result<Namespace> {
    builder::pack(src, dest, options)
}

/// Pack an explicit, already crawled list of paths below `src`
pub fn pack_from_files(
    src: &Path,
    dest: &Path,
    files: &[PathBuf],
    metadata: &mut CrawlMetadata,
    options: &PackOptions,
) -> Result<Namespace> {
    builder::pack_from_files(src, dest, files, metadata, options)
}

/// Every path in the archive, depth first
///
/// With `annotate` each line starts with `packed   : ` or `unpacked : `.
pub fn list_package(
    cache: &mut HeaderCache,
    archive: &Path,
    annotate: bool,
) -> Result<Vec<String>> {
    Ok(cache.load(archive)?.list_paths(annotate))
}

/// The node stored at `rel`
pub fn stat_file(
    cache: &mut HeaderCache,
    archive: &Path,
    rel: &str,
    follow_links: bool,
) -> Result<Node> {
    let archive = cache.load(archive)?;
    Ok(archive.stat(rel, follow_links)?.clone())
}

/// Contents of the file at `rel`
pub fn extract_file(
    cache: &mut HeaderCache,
    archive: &Path,
    rel: &str,
    follow_links: bool,
) -> Result<Vec<u8>> {
    let archive = cache.load(archive)?;
    debug!("Extracting {} from {}", rel, archive.path().display());
    archive.extract_file(rel, follow_links)
}

/// Recreate the archive's tree below `dest`
pub fn extract_all(cache: &mut HeaderCache, archive: &Path, dest: &Path) -> Result<()> {
    cache.load(archive)?.extract_all(dest)
}

/// Header of `archive` as stored, without consulting any cache
pub fn get_raw_header(archive: &Path) -> Result<ArchiveHeader> {
    header::read_archive_header(archive)
}
