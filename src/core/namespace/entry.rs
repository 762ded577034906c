//! Header node types
//!
//! The JSON shape is shared with other asar tools, so field names follow
//! it exactly: directories carry `files`, links carry `link`, everything
//! else is a file. Offsets are decimal strings on disk.

use crate::integrity::FileIntegrity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_false(value: &bool) -> bool {
    !*value
}

/// One node of the namespace tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Directory(DirectoryEntry),
    Link(LinkEntry),
    File(FileEntry),
}

impl Node {
    /// Whether the node lives in the side directory
    pub fn is_unpacked(&self) -> bool {
        match self {
            Node::Directory(dir) => dir.unpacked,
            Node::File(file) => file.unpacked,
            Node::Link(link) => link.unpacked,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Node::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&LinkEntry> {
        match self {
            Node::Link(link) => Some(link),
            _ => None,
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::Directory(DirectoryEntry::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Children keyed by name
    pub files: BTreeMap<String, Node>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub unpacked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub size: u64,

    /// Position within the packed region; absent for unpacked files
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "offset_string"
    )]
    pub offset: Option<u64>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub unpacked: bool,

    /// Missing in archives written by older tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<FileIntegrity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Target, relative to the archive root
    pub link: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub unpacked: bool,
}

mod offset_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(offset: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match offset {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Some writers emit a bare number
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(value)) => Ok(Some(value)),
            Some(Raw::Text(text)) => text
                .parse::<u64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid offset \"{}\"", text))),
        }
    }
}
