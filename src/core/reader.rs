//! Archive reader
//!
//! An [`Archive`] is the parsed header of one archive file. It keeps no file
//! handle; every read opens the archive, reads, and closes it again.

use crate::error::{AsarError, IoResultExt, Result};
use crate::header::{read_archive_header, ArchiveHeader};
use crate::namespace::{FileEntry, Namespace, Node};
use crate::paths::{
    absolute, ensure_within, join_archive_path, normalize, relative, side_directory,
    starts_with_parent,
};
use crate::platform;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Immutable view of an archive on disk
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    header: ArchiveHeader,
}

impl Archive {
    pub fn open(path: &Path) -> Result<Self> {
        let path = absolute(path)?;
        let header = read_archive_header(&path)?;
        debug!(
            "Opened {} (header {} bytes, {} packed bytes)",
            path.display(),
            header.header_size,
            header.namespace.packed_size()
        );
        Ok(Archive { path, header })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    pub fn namespace(&self) -> &Namespace {
        &self.header.namespace
    }

    pub fn list_paths(&self, annotate: bool) -> Vec<String> {
        self.namespace().list_paths(annotate)
    }

    pub fn stat(&self, rel: &str, follow_links: bool) -> Result<&Node> {
        self.namespace().lookup(rel, follow_links)
    }

    pub fn get_file(&self, rel: &str, follow_links: bool) -> Result<&FileEntry> {
        self.namespace().get_file(rel, follow_links)
    }

    /// Contents of the file at `rel`
    pub fn extract_file(&self, rel: &str, follow_links: bool) -> Result<Vec<u8>> {
        let (resolved, node) = self.namespace().lookup_resolved(rel, follow_links)?;
        match node {
            Node::File(file) => self.read_file(&resolved, file),
            Node::Directory(_) | Node::Link(_) => Err(AsarError::NotAFile(rel.to_string())),
        }
    }

    /// Bytes of `file`, which lives at the archive path `rel`
    ///
    /// Packed entries come from the archive body, unpacked ones from the
    /// side directory.
    pub fn read_file(&self, rel: &str, file: &FileEntry) -> Result<Vec<u8>> {
        if file.size == 0 {
            return Ok(Vec::new());
        }
        if file.unpacked {
            let path = join_archive_path(&side_directory(&self.path), rel);
            return fs::read(&path).with_path(&path);
        }

        let offset = file
            .offset
            .ok_or_else(|| AsarError::Format(format!("\"{}\" has no offset", rel)))?;
        let start = self
            .header
            .data_start()
            .checked_add(offset)
            .ok_or_else(|| AsarError::Format(format!("\"{}\" has an invalid offset", rel)))?;

        let mut archive = File::open(&self.path).with_path(&self.path)?;
        let archive_len = archive.metadata().with_path(&self.path)?.len();
        if start.saturating_add(file.size) > archive_len {
            return Err(AsarError::Format(format!(
                "\"{}\" extends past the end of the archive",
                rel
            )));
        }

        archive.seek(SeekFrom::Start(start)).with_path(&self.path)?;
        let mut buf = vec![0u8; file.size as usize];
        archive.read_exact(&mut buf).with_path(&self.path)?;
        Ok(buf)
    }

    /// Recreate the whole tree below `dest`
    ///
    /// Links are recreated as links except on Windows, where their targets
    /// are written out as plain copies.
    pub fn extract_all(&self, dest: &Path) -> Result<()> {
        let dest = absolute(dest)?;
        let follow_links = cfg!(windows);
        info!("Extracting {} into {}", self.path.display(), dest.display());
        fs::create_dir_all(&dest).with_path(&dest)?;

        let mut written = 0usize;
        for (full, _) in self.namespace().walk() {
            let rel = full.trim_start_matches('/');
            let target = dest.join(ensure_within(&dest, Path::new(rel), &full)?);
            let (resolved, node) = self.namespace().lookup_resolved(rel, follow_links)?;

            match node {
                Node::Directory(_) => {
                    fs::create_dir_all(&target).with_path(&target)?;
                }
                Node::Link(link) => {
                    self.extract_link(&dest, &full, &target, &link.link)?;
                }
                Node::File(file) => {
                    let content = self.read_file(&resolved, file)?;
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent).with_path(parent)?;
                    }
                    fs::write(&target, &content).with_path(&target)?;
                    if file.executable {
                        platform::set_executable(&target).with_path(&target)?;
                    }
                    written += 1;
                }
            }
        }

        info!("Extracted {} files into {}", written, dest.display());
        Ok(())
    }

    fn extract_link(&self, dest: &Path, entry: &str, target: &Path, link: &str) -> Result<()> {
        let link_path = join_archive_path(dest, link);
        let link_dir = normalize(link_path.parent().unwrap_or(dest));
        if starts_with_parent(&relative(dest, &link_dir)) {
            return Err(AsarError::Escape {
                entry: entry.to_string(),
                target: link.to_string(),
            });
        }

        let target_dir = target.parent().unwrap_or(dest);
        let mut link_to = relative(target_dir, &link_dir);
        if let Some(name) = link_path.file_name() {
            link_to.push(name);
        }

        fs::create_dir_all(target_dir).with_path(target_dir)?;
        platform::remove_existing(target).with_path(target)?;
        platform::symlink(&link_to, target).with_path(target)?;
        debug!("Linked {} -> {}", target.display(), link_to.display());
        Ok(())
    }
}
