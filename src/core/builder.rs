//! Archive builder
//!
//! Packing runs in two phases. The first classifies every input path and
//! builds the namespace tree, assigning offsets in processing order. The
//! second writes the header and then streams packed file bytes in the same
//! order, copying unpacked entries into the side directory.
//!
//! Nothing is cleaned up when a pack fails part way.

use crate::config::PackOptions;
use crate::crawl::{
    crawl, has_dot_component, Classifier, CrawlMetadata, Crawled, EntryKind, FsClassifier,
};
use crate::error::{AsarError, IoResultExt, Result};
use crate::header::encode_header;
use crate::integrity::file_integrity;
use crate::namespace::{Namespace, Node, MAX_FILE_SIZE};
use crate::ordering::{load_manifest, order_paths};
use crate::paths::{
    absolute, join_archive_path, normalize, relative, side_directory, starts_with_parent, to_slash,
};
use crate::platform;
use crate::unpack::UnpackRules;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Crawl `src` and pack it into `dest`
pub fn pack(src: &Path, dest: &Path, options: &PackOptions) -> Result<Namespace> {
    let src = absolute(src)?;
    let (files, mut metadata) = crawl(&src, options.dot)?;
    pack_from_files(&src, dest, &files, &mut metadata, options)
}

/// Pack an explicit list of paths below `src`
///
/// `metadata` may describe some or all of `files`; anything missing is
/// classified from the filesystem and added to it.
pub fn pack_from_files(
    src: &Path,
    dest: &Path,
    files: &[PathBuf],
    metadata: &mut CrawlMetadata,
    options: &PackOptions,
) -> Result<Namespace> {
    pack_with_classifier(src, dest, files, metadata, options, &FsClassifier)
}

/// [`pack_from_files`] with a caller-supplied classifier
pub fn pack_with_classifier<C: Classifier>(
    src: &Path,
    dest: &Path,
    files: &[PathBuf],
    metadata: &mut CrawlMetadata,
    options: &PackOptions,
    classifier: &C,
) -> Result<Namespace> {
    let src = absolute(src)?;
    let dest = absolute(dest)?;
    info!("Packing {} into {}", src.display(), dest.display());

    let mut inputs = Vec::with_capacity(files.len());
    for file in files {
        let abs = if file.is_absolute() {
            normalize(file)
        } else {
            absolute(&src.join(file))?
        };
        if abs != *file {
            if let Some(crawled) = metadata.remove(file) {
                metadata.insert(abs.clone(), crawled);
            }
        }
        inputs.push(abs);
    }

    let manifest = match &options.ordering {
        Some(manifest) => load_manifest(manifest)?,
        None => Vec::new(),
    };
    let ordered = order_paths(&src, &inputs, &manifest);

    let mut plan = PackPlan::new(&src, options)?;
    for path in &ordered {
        let crawled = match metadata.get(path) {
            Some(crawled) => crawled.clone(),
            None => {
                let crawled = classifier.classify(path)?;
                metadata.insert(path.clone(), crawled.clone());
                crawled
            }
        };
        plan.add(path, &crawled)?;
    }

    plan.namespace.compact_offsets();
    let written = plan.write(&dest)?;
    info!(
        "Packed {} files ({} bytes) into {}",
        written,
        plan.namespace.next_offset(),
        dest.display()
    );
    Ok(plan.namespace)
}

/// Tree under construction plus the byte sources it refers to
struct PackPlan<'a> {
    src: &'a Path,
    real_src: PathBuf,
    dot: bool,
    rules: UnpackRules,
    namespace: Namespace,
    /// Source of every file or link placed so far, by archive path
    ///
    /// A later insert at the same path replaces the earlier source.
    sources: HashMap<String, PathBuf>,
}

impl<'a> PackPlan<'a> {
    fn new(src: &'a Path, options: &PackOptions) -> Result<Self> {
        Ok(PackPlan {
            src,
            real_src: fs::canonicalize(src).with_path(src)?,
            dot: options.dot,
            rules: UnpackRules::new(options.unpack.as_deref(), options.unpack_dir.as_deref())?,
            namespace: Namespace::new(),
            sources: HashMap::new(),
        })
    }

    fn add(&mut self, path: &Path, crawled: &Crawled) -> Result<()> {
        let rel_path = relative(self.src, path);
        if starts_with_parent(&rel_path) {
            return Err(AsarError::Escape {
                entry: path.display().to_string(),
                target: self.src.display().to_string(),
            });
        }
        let rel = to_slash(&rel_path);
        if rel.is_empty() {
            return Ok(());
        }
        if !self.dot && has_dot_component(&rel_path) {
            debug!("Skipping dot entry {}", rel);
            return Ok(());
        }

        match crawled.kind {
            EntryKind::Directory => {
                let unpack = self.rules.for_directory(&rel);
                self.namespace.ensure_directory(&rel, unpack);
            }
            EntryKind::File => {
                let unpack = self.rules.for_entry(&rel);
                let size = crawled.metadata.len();
                if !unpack && size > MAX_FILE_SIZE {
                    return Err(AsarError::FileTooLarge {
                        path: path.to_path_buf(),
                        size,
                    });
                }
                let integrity = file_integrity(path)?;
                let executable = platform::is_executable(&crawled.metadata);
                match self.namespace.insert_file(&rel, size, executable, integrity, unpack)? {
                    Some(offset) => debug!("{} packed at offset {} ({} bytes)", rel, offset, size),
                    None => debug!("{} unpacked", rel),
                }
                self.sources.insert(rel, path.to_path_buf());
            }
            EntryKind::Link => {
                let unpack = self.rules.for_entry(&rel);
                let target = resolve_link_target(&self.real_src, path)?;
                self.namespace.insert_link(&rel, &target, unpack)?;
                self.sources.insert(rel, path.to_path_buf());
            }
        }
        Ok(())
    }

    fn source(&self, rel: &str) -> Result<&Path> {
        self.sources
            .get(rel)
            .map(PathBuf::as_path)
            .ok_or_else(|| AsarError::Format(format!("no source recorded for \"{}\"", rel)))
    }

    /// Write the archive and side directory, returning the packed file count
    ///
    /// Only nodes still present in the final tree are written.
    fn write(&self, dest: &Path) -> Result<usize> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        let header = encode_header(&self.namespace.to_json()?)?;
        let file = File::create(dest).with_path(dest)?;
        let mut out = BufWriter::new(file);
        out.write_all(&header).with_path(dest)?;
        let packed = self.namespace.packed_files();
        for (path, file) in &packed {
            let source = self.source(path.trim_start_matches('/'))?;
            copy_exact(source, file.size, &mut out, dest)?;
        }
        out.flush().with_path(dest)?;

        let side = side_directory(dest);
        for (path, node) in self.namespace.walk() {
            if !node.is_unpacked() {
                continue;
            }
            let rel = path.trim_start_matches('/');
            let target = join_archive_path(&side, rel);
            match node {
                Node::Directory(_) => continue,
                Node::File(_) => {
                    let source = self.source(rel)?;
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent).with_path(parent)?;
                    }
                    fs::copy(source, &target).with_path(source)?;
                }
                Node::Link(_) => {
                    let source = self.source(rel)?;
                    let link = fs::read_link(source).with_path(source)?;
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent).with_path(parent)?;
                    }
                    platform::remove_existing(&target).with_path(&target)?;
                    platform::symlink(&link, &target).with_path(&target)?;
                }
            }
        }
        Ok(packed.len())
    }
}

/// Root-relative target of the link at `path`
///
/// The stored text is joined with the real location of the link's parent,
/// then expressed relative to the real source root.
fn resolve_link_target(real_src: &Path, path: &Path) -> Result<String> {
    let parent = path.parent().unwrap_or(path);
    let real_parent = fs::canonicalize(parent).with_path(parent)?;
    let stored = fs::read_link(path).with_path(path)?;
    let joined = normalize(&real_parent.join(stored));
    Ok(to_slash(&relative(real_src, &joined)))
}

fn copy_exact<W: Write>(source: &Path, size: u64, out: &mut W, dest: &Path) -> Result<()> {
    let file = File::open(source).with_path(source)?;
    let mut limited = file.take(size);
    let copied = io::copy(&mut limited, out).with_path(dest)?;
    if copied != size {
        return Err(AsarError::Format(format!(
            "{}: expected {} bytes, read {}",
            source.display(),
            size,
            copied
        )));
    }
    Ok(())
}
