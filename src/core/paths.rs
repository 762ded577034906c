//! Lexical path helpers shared by packing and extraction
//!
//! Nothing here reads the filesystem. Containment is decided on the cleaned
//! path text only: a relative path escapes when its first component is `..`.
//! Escapes through symlinks already on disk are not detected.

use crate::error::{AsarError, Result};
use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without consulting the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Express `target` relative to `base`, both cleaned lexically first
pub fn relative(base: &Path, target: &Path) -> PathBuf {
    let base = normalize(base);
    let target = normalize(target);

    let base_comps: Vec<_> = base.components().collect();
    let target_comps: Vec<_> = target.components().collect();
    let common = base_comps
        .iter()
        .zip(&target_comps)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base_comps.len() {
        rel.push("..");
    }
    for comp in &target_comps[common..] {
        rel.push(comp.as_os_str());
    }
    rel
}

/// True when the first component of `rel` is a parent-directory token
pub fn starts_with_parent(rel: &Path) -> bool {
    matches!(rel.components().next(), Some(Component::ParentDir))
}

/// Resolve `candidate` against `root` and require it to stay inside
///
/// Returns the root-relative path. `entry` names what is being checked and
/// only feeds the error message.
pub fn ensure_within(root: &Path, candidate: &Path, entry: &str) -> Result<PathBuf> {
    let rel = relative(root, &root.join(candidate));
    if starts_with_parent(&rel) {
        return Err(AsarError::Escape {
            entry: entry.to_string(),
            target: candidate.display().to_string(),
        });
    }
    Ok(rel)
}

/// Render a relative path with forward slashes
pub fn to_slash(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Split an archive path into its non-empty, non-`.` segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Anchor `path` at the working directory and clean it lexically
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let cwd = std::env::current_dir().map_err(|e| AsarError::io(path, e))?;
    Ok(normalize(&cwd.join(path)))
}

/// Sibling directory holding the unpacked entries of `archive`
pub fn side_directory(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".unpacked");
    PathBuf::from(name)
}

/// Turn an archive path into a platform path below `base`
pub fn join_archive_path(base: &Path, rel: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for name in segments(rel) {
        out.push(name);
    }
    out
}
