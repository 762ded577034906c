//! In-memory namespace tree
//!
//! The tree is what the archive header describes: directories, files with
//! their offsets into the packed region, and links. Paths handed to the
//! tree are archive-relative and use `/` as separator.

pub mod entry;

pub use entry::{DirectoryEntry, FileEntry, LinkEntry, Node};

use crate::error::{AsarError, Result};
use crate::integrity::FileIntegrity;
use crate::paths::{segments, starts_with_parent};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Largest file that can be given an offset
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Link hops followed before a lookup gives up
pub const MAX_LINK_HOPS: usize = 40;

/// Deepest JSON nesting a header may have
///
/// Each directory level costs two levels (the directory object and its
/// `files` map), so this allows trees 511 directories deep.
pub const MAX_HEADER_DEPTH: usize = 1024;

/// Directory / file / link tree plus the running packed offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    root: Node,
    offset: u64,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace {
            root: Node::default(),
            offset: 0,
        }
    }

    /// Parse a header JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        check_depth(json)?;
        let mut de = serde_json::Deserializer::from_str(json);
        de.disable_recursion_limit();
        let root = DirectoryEntry::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;

        let mut namespace = Namespace {
            root: Node::Directory(root),
            offset: 0,
        };
        let end = namespace
            .packed_files()
            .last()
            .map(|(_, file)| file.offset.unwrap_or(0).saturating_add(file.size))
            .unwrap_or(0);
        namespace.offset = end;
        Ok(namespace)
    }

    /// Serialize to the header JSON string
    ///
    /// Trees too deep to be read back are refused here.
    pub fn to_json(&self) -> Result<String> {
        let json = serde_json::to_string(&self.root)?;
        check_depth(&json)?;
        Ok(json)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Offset the next packed file would receive
    pub fn next_offset(&self) -> u64 {
        self.offset
    }

    /// Create `path` and any missing parents as directories
    ///
    /// A file or link found along the way is replaced by an empty directory.
    /// Inserts are last-write-wins; conflicting kinds are not reported.
    pub fn ensure_directory(&mut self, path: &str, unpack: bool) -> &mut DirectoryEntry {
        let mut current = coerce_directory(&mut self.root);
        for name in segments(path) {
            let child = current.files.entry(name.to_string()).or_default();
            current = coerce_directory(child);
        }
        if unpack {
            current.unpacked = true;
        }
        current
    }

    /// Place a file at `path`, returning the offset it was given
    ///
    /// Files inside an unpacked directory are unpacked as well. Only packed
    /// files advance the running offset.
    pub fn insert_file(
        &mut self,
        path: &str,
        size: u64,
        executable: bool,
        integrity: FileIntegrity,
        unpack: bool,
    ) -> Result<Option<u64>> {
        let (parent, name) = split_parent(path)?;
        let next = self.offset;

        let parent_unpacked = matches!(
            self.lookup(&parent, false),
            Ok(Node::Directory(dir)) if dir.unpacked
        );
        if !(unpack || parent_unpacked) && size > MAX_FILE_SIZE {
            return Err(AsarError::FileTooLarge {
                path: PathBuf::from(path),
                size,
            });
        }

        let dir = self.ensure_directory(&parent, false);
        let unpacked = unpack || dir.unpacked;
        let offset = if unpacked { None } else { Some(next) };
        dir.files.insert(
            name,
            Node::File(FileEntry {
                size,
                offset,
                executable,
                unpacked,
                integrity: Some(integrity),
            }),
        );

        if !unpacked {
            self.offset += size;
        }
        Ok(offset)
    }

    /// Place a link at `path` pointing at the root-relative `target`
    ///
    /// Fails without touching the tree when the target climbs out of the
    /// archive root.
    pub fn insert_link(&mut self, path: &str, target: &str, unpack: bool) -> Result<()> {
        if starts_with_parent(Path::new(target)) {
            return Err(AsarError::Escape {
                entry: path.to_string(),
                target: target.to_string(),
            });
        }
        let (parent, name) = split_parent(path)?;

        let dir = self.ensure_directory(&parent, false);
        let unpacked = unpack || dir.unpacked;
        dir.files.insert(
            name,
            Node::Link(LinkEntry {
                link: target.to_string(),
                unpacked,
            }),
        );
        Ok(())
    }

    /// Find the node at `path`
    ///
    /// With `follow_links`, every link met on the way, including the final
    /// node, is replaced by the node its root-relative target names.
    pub fn lookup(&self, path: &str, follow_links: bool) -> Result<&Node> {
        Ok(self.lookup_resolved(path, follow_links)?.1)
    }

    /// Like [`lookup`](Self::lookup), also returning the path the node
    /// really lives at once links are followed
    pub fn lookup_resolved(&self, path: &str, follow_links: bool) -> Result<(String, &Node)> {
        let mut hops = 0;
        let (parts, node) = self.resolve(path, follow_links, &mut hops)?;
        Ok((parts.join("/"), node))
    }

    /// Like [`lookup`](Self::lookup), but only succeeds for files
    pub fn get_file(&self, path: &str, follow_links: bool) -> Result<&FileEntry> {
        match self.lookup(path, follow_links)? {
            Node::File(file) => Ok(file),
            Node::Directory(_) | Node::Link(_) => Err(AsarError::NotAFile(path.to_string())),
        }
    }

    /// Every path in the tree, depth first, as `/a/b`
    ///
    /// With `annotate` each line is prefixed by its storage state.
    pub fn list_paths(&self, annotate: bool) -> Vec<String> {
        self.walk()
            .into_iter()
            .map(|(path, node)| {
                if annotate {
                    let state = if node.is_unpacked() { "unpacked" } else { "packed" };
                    format!("{:<8} : {}", state, path)
                } else {
                    path
                }
            })
            .collect()
    }

    /// Depth-first traversal yielding `/`-prefixed paths with their nodes
    pub fn walk(&self) -> Vec<(String, &Node)> {
        let mut out = Vec::new();
        if let Node::Directory(dir) = &self.root {
            walk_dir(dir, "", &mut out);
        }
        out
    }

    /// Packed files ordered by offset
    pub fn packed_files(&self) -> Vec<(String, &FileEntry)> {
        let mut files: Vec<(String, &FileEntry)> = self
            .walk()
            .into_iter()
            .filter_map(|(path, node)| match node {
                Node::File(file) if !file.unpacked => Some((path, file)),
                _ => None,
            })
            .collect();
        files.sort_by_key(|(_, file)| (file.offset.unwrap_or(0), file.size));
        files
    }

    /// Renumber packed files so their offsets tile from zero again
    ///
    /// Replacing a packed file leaves its old range unused. Relative order
    /// is kept.
    pub fn compact_offsets(&mut self) {
        let order: Vec<String> = self.packed_files().into_iter().map(|(path, _)| path).collect();
        let mut next = 0u64;
        for path in order {
            if let Some(file) = self.file_mut(&path) {
                file.offset = Some(next);
                next += file.size;
            }
        }
        self.offset = next;
    }

    /// Total bytes of the packed region
    pub fn packed_size(&self) -> u64 {
        self.packed_files().iter().map(|(_, file)| file.size).sum()
    }

    fn file_mut(&mut self, path: &str) -> Option<&mut FileEntry> {
        let mut node = &mut self.root;
        for name in segments(path) {
            node = match node {
                Node::Directory(dir) => dir.files.get_mut(name)?,
                Node::File(_) | Node::Link(_) => return None,
            };
        }
        match node {
            Node::File(file) => Some(file),
            Node::Directory(_) | Node::Link(_) => None,
        }
    }

    fn resolve<'a>(
        &'a self,
        path: &str,
        follow_links: bool,
        hops: &mut usize,
    ) -> Result<(Vec<String>, &'a Node)> {
        let mut node = &self.root;
        let mut parts: Vec<String> = Vec::new();
        for name in segments(path) {
            if follow_links {
                if let Node::Link(link) = node {
                    (parts, node) = self.follow(&link.link, path, hops)?;
                }
            }
            node = match node {
                Node::Directory(dir) => dir
                    .files
                    .get(name)
                    .ok_or_else(|| AsarError::NotFound(path.to_string()))?,
                Node::File(_) | Node::Link(_) => {
                    return Err(AsarError::NotFound(path.to_string()))
                }
            };
            parts.push(name.to_string());
        }
        if follow_links {
            if let Node::Link(link) = node {
                (parts, node) = self.follow(&link.link, path, hops)?;
            }
        }
        Ok((parts, node))
    }

    fn follow<'a>(
        &'a self,
        target: &str,
        path: &str,
        hops: &mut usize,
    ) -> Result<(Vec<String>, &'a Node)> {
        *hops += 1;
        if *hops > MAX_LINK_HOPS {
            return Err(AsarError::LinkLoop(path.to_string()));
        }
        self.resolve(target, true, hops)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

fn coerce_directory(node: &mut Node) -> &mut DirectoryEntry {
    if !matches!(node, Node::Directory(_)) {
        *node = Node::Directory(DirectoryEntry::default());
    }
    match node {
        Node::Directory(dir) => dir,
        Node::File(_) | Node::Link(_) => unreachable!("node was just replaced by a directory"),
    }
}

/// Reject JSON nested deeper than [`MAX_HEADER_DEPTH`]
fn check_depth(json: &str) -> Result<()> {
    let depth = nesting_depth(json);
    if depth > MAX_HEADER_DEPTH {
        return Err(AsarError::Format(format!(
            "header nests {} levels deep, at most {} are supported",
            depth, MAX_HEADER_DEPTH
        )));
    }
    Ok(())
}

/// Deepest object/array nesting in `json`, ignoring brackets inside strings
fn nesting_depth(json: &str) -> usize {
    let (mut depth, mut deepest) = (0usize, 0usize);
    let (mut in_string, mut escaped) = (false, false);
    for byte in json.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn split_parent(path: &str) -> Result<(String, String)> {
    let mut parts: Vec<&str> = segments(path).collect();
    let name = parts
        .pop()
        .ok_or_else(|| AsarError::Format(format!("cannot insert at archive root: \"{}\"", path)))?;
    Ok((parts.join("/"), name.to_string()))
}

fn walk_dir<'a>(dir: &'a DirectoryEntry, base: &str, out: &mut Vec<(String, &'a Node)>) {
    for (name, child) in &dir.files {
        let path = format!("{}/{}", base, name);
        out.push((path.clone(), child));
        if let Node::Directory(sub) = child {
            walk_dir(sub, &path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::compute_integrity;

    fn integrity(data: &[u8]) -> FileIntegrity {
        compute_integrity(data).unwrap()
    }

    #[test]
    fn test_ensure_directory_creates_parents() {
        let mut ns = Namespace::new();
        ns.ensure_directory("a/b/c", false);
        assert!(matches!(ns.lookup("a/b/c", false).unwrap(), Node::Directory(_)));
        assert!(matches!(ns.lookup("/a/b", false).unwrap(), Node::Directory(_)));
    }

    #[test]
    fn test_offsets_follow_insertion_order() {
        let mut ns = Namespace::new();
        assert_eq!(ns.insert_file("b.txt", 5, false, integrity(b"hello"), false).unwrap(), Some(0));
        assert_eq!(ns.insert_file("a.txt", 3, false, integrity(b"abc"), false).unwrap(), Some(5));
        assert_eq!(ns.insert_file("u.bin", 9, false, integrity(b"x"), true).unwrap(), None);
        assert_eq!(ns.insert_file("c/d.txt", 2, true, integrity(b"hi"), false).unwrap(), Some(8));
        assert_eq!(ns.next_offset(), 10);
        assert_eq!(ns.packed_size(), 10);
    }

    #[test]
    fn test_file_inherits_unpacked_directory() {
        let mut ns = Namespace::new();
        ns.ensure_directory("assets", true);
        let offset = ns
            .insert_file("assets/logo.png", 4, false, integrity(b"logo"), false)
            .unwrap();
        assert_eq!(offset, None);
        assert!(ns.get_file("assets/logo.png", false).unwrap().unpacked);
        assert_eq!(ns.next_offset(), 0);
    }

    #[test]
    fn test_directory_replaces_file_last_write_wins() {
        let mut ns = Namespace::new();
        ns.insert_file("thing", 1, false, integrity(b"x"), false).unwrap();
        ns.ensure_directory("thing/inner", false);
        assert!(matches!(ns.lookup("thing", false).unwrap(), Node::Directory(_)));

        // and a file replaces a directory
        ns.insert_file("thing", 1, false, integrity(b"y"), false).unwrap();
        assert!(matches!(ns.lookup("thing", false).unwrap(), Node::File(_)));
    }

    #[test]
    fn test_compact_offsets_after_replacement() {
        let mut ns = Namespace::new();
        ns.insert_file("a.txt", 3, false, integrity(b"abc"), false).unwrap();
        ns.insert_file("b.txt", 2, false, integrity(b"hi"), false).unwrap();
        ns.insert_file("a.txt", 3, false, integrity(b"abc"), false).unwrap();
        assert_eq!(ns.get_file("b.txt", false).unwrap().offset, Some(3));
        assert_eq!(ns.next_offset(), 8);

        ns.compact_offsets();
        assert_eq!(ns.get_file("b.txt", false).unwrap().offset, Some(0));
        assert_eq!(ns.get_file("a.txt", false).unwrap().offset, Some(2));
        assert_eq!(ns.next_offset(), 5);
        assert_eq!(ns.packed_size(), 5);
    }

    #[test]
    fn test_file_too_large() {
        let mut ns = Namespace::new();
        let err = ns
            .insert_file("huge.bin", MAX_FILE_SIZE + 1, false, integrity(b""), false)
            .unwrap_err();
        assert!(matches!(err, AsarError::FileTooLarge { .. }));

        // unpacked files never get an offset, so size is no concern here
        assert!(ns
            .insert_file("huge.bin", MAX_FILE_SIZE + 1, false, integrity(b""), true)
            .is_ok());
    }

    #[test]
    fn test_rejected_file_leaves_no_parents() {
        let mut ns = Namespace::new();
        let err = ns
            .insert_file("a/b/huge.bin", MAX_FILE_SIZE + 1, false, integrity(b""), false)
            .unwrap_err();
        assert!(matches!(err, AsarError::FileTooLarge { .. }));
        assert!(ns.walk().is_empty());

        // an unpacked parent still lets the file through
        ns.ensure_directory("native", true);
        assert_eq!(
            ns.insert_file("native/huge.bin", MAX_FILE_SIZE + 1, false, integrity(b""), false)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_link_escape_rejected_without_commit() {
        let mut ns = Namespace::new();
        let err = ns.insert_link("dir/evil", "../outside", false).unwrap_err();
        assert!(err.is_escape());
        assert!(ns.lookup("dir", false).is_err());
        assert!(ns.walk().is_empty());
    }

    #[test]
    fn test_lookup_follows_links() {
        let mut ns = Namespace::new();
        ns.insert_file("real/file.txt", 2, false, integrity(b"ok"), false).unwrap();
        ns.insert_link("alias", "real", false).unwrap();
        ns.insert_link("direct", "real/file.txt", false).unwrap();

        assert!(matches!(ns.lookup("alias", false).unwrap(), Node::Link(_)));
        assert!(matches!(ns.lookup("alias", true).unwrap(), Node::Directory(_)));
        assert_eq!(ns.get_file("alias/file.txt", true).unwrap().size, 2);
        assert_eq!(ns.get_file("direct", true).unwrap().size, 2);
        assert!(ns.get_file("alias/file.txt", false).is_err());

        let (resolved, _) = ns.lookup_resolved("alias/file.txt", true).unwrap();
        assert_eq!(resolved, "real/file.txt");
        let (resolved, _) = ns.lookup_resolved("direct", false).unwrap();
        assert_eq!(resolved, "direct");
    }

    #[test]
    fn test_link_cycle_gives_up() {
        let mut ns = Namespace::new();
        ns.insert_link("a", "b", false).unwrap();
        ns.insert_link("b", "a", false).unwrap();
        assert!(matches!(ns.lookup("a", true), Err(AsarError::LinkLoop(_))));
    }

    #[test]
    fn test_get_file_on_directory() {
        let mut ns = Namespace::new();
        ns.ensure_directory("dir", false);
        assert!(matches!(ns.get_file("dir", false), Err(AsarError::NotAFile(_))));
        assert!(matches!(ns.get_file("missing", false), Err(AsarError::NotFound(_))));
    }

    #[test]
    fn test_list_paths_depth_first() {
        let mut ns = Namespace::new();
        ns.insert_file("b/z.txt", 1, false, integrity(b"z"), false).unwrap();
        ns.insert_file("a.txt", 1, false, integrity(b"a"), false).unwrap();
        ns.ensure_directory("c", true);
        ns.insert_file("c/x.txt", 1, false, integrity(b"x"), false).unwrap();

        assert_eq!(
            ns.list_paths(false),
            vec!["/a.txt", "/b", "/b/z.txt", "/c", "/c/x.txt"]
        );
        let annotated = ns.list_paths(true);
        assert_eq!(annotated[0], "packed   : /a.txt");
        assert_eq!(annotated[3], "unpacked : /c");
        assert_eq!(annotated[4], "unpacked : /c/x.txt");
    }

    #[test]
    fn test_header_round_trip() {
        let mut ns = Namespace::new();
        ns.insert_file("index.js", 5, false, integrity(b"hello"), false).unwrap();
        ns.insert_file("bin/run", 2, true, integrity(b"#!"), false).unwrap();
        ns.ensure_directory("native", true);
        ns.insert_file("native/addon.node", 3, false, integrity(b"elf"), false).unwrap();
        ns.insert_link("entry", "index.js", false).unwrap();

        let json = ns.to_json().unwrap();
        let parsed = Namespace::from_json(&json).unwrap();
        assert_eq!(parsed, ns);
        assert_eq!(parsed.next_offset(), 7);
    }

    fn nested_json(levels: usize) -> String {
        let mut json = String::new();
        for idx in 0..levels {
            json.push_str(&format!("{{\"files\":{{\"d{}\":", idx));
        }
        json.push_str(r#"{"files":{}}"#);
        json.push_str(&"}}".repeat(levels));
        json
    }

    #[test]
    fn test_deep_header_parses() {
        let ns = Namespace::from_json(&nested_json(200)).unwrap();
        let path: Vec<String> = (0..200).map(|idx| format!("d{}", idx)).collect();
        assert!(matches!(ns.lookup(&path.join("/"), false).unwrap(), Node::Directory(_)));
        assert_eq!(ns.walk().len(), 200);
    }

    #[test]
    fn test_too_deep_header_rejected() {
        let err = Namespace::from_json(&nested_json(MAX_HEADER_DEPTH)).unwrap_err();
        assert!(matches!(err, AsarError::Format(_)));

        let mut ns = Namespace::new();
        let levels = MAX_HEADER_DEPTH / 2;
        let path: Vec<String> = (0..levels).map(|idx| format!("d{}", idx)).collect();
        ns.ensure_directory(&path.join("/"), false);
        assert!(matches!(ns.to_json(), Err(AsarError::Format(_))));
    }

    #[test]
    fn test_nesting_depth_skips_strings() {
        assert_eq!(nesting_depth(r#"{"files":{}}"#), 2);
        assert_eq!(nesting_depth(r#"{"a":"{{[[\"}}"}"#), 1);
        assert_eq!(nesting_depth(""), 0);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(Namespace::from_json("not json").is_err());
        assert!(Namespace::from_json(r#"{"link": "x"}"#).is_err());
    }
}
