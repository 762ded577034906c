//! Unpack selection rules
//!
//! Two independent rules decide whether an entry goes to the side
//! directory instead of the packed blob:
//!
//! - `unpack`: a glob matched against the entry's base name
//! - `unpack_dir`: a glob or plain prefix matched against directory paths
//!
//! Directories matched by `unpack_dir` are remembered, so everything below
//! them is unpacked too even when the descendants match nothing.
//!
//! Glob syntax:
//! - `*` matches within one path segment
//! - `**` matches across segments
//! - `?` matches one character
//! - `[abc]` / `[!abc]` character classes
//! - `{a,b}` alternatives

use crate::error::Result;
use regex::Regex;
use tracing::debug;

/// A compiled glob
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^{}$", translate(pattern)))?;
        Ok(GlobPattern {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    i += 1;
                    if chars.get(i + 1) == Some(&'/') {
                        // `**/` may also match nothing at all
                        i += 1;
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut j = i + 1;
                    if chars[j] == '!' || chars[j] == '^' {
                        out.push('^');
                        j += 1;
                    }
                    for &c in &chars[j..end] {
                        if c == '\\' || c == '[' || c == '&' || c == '~' {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push(']');
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            '{' => match chars[i + 1..].iter().position(|&c| c == '}') {
                Some(rel_end) if chars[i + 1..i + 1 + rel_end].contains(&',') => {
                    let body: String = chars[i + 1..i + 1 + rel_end].iter().collect();
                    let alternatives: Vec<String> = body.split(',').map(translate).collect();
                    out.push_str("(?:");
                    out.push_str(&alternatives.join("|"));
                    out.push(')');
                    i += rel_end + 1;
                }
                _ => out.push_str(r"\{"),
            },
            '\\' if i + 1 < chars.len() => {
                i += 1;
                out.push_str(&regex::escape(&chars[i].to_string()));
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `start`
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if matches!(chars.get(j), Some('!') | Some('^')) {
        j += 1;
    }
    // a leading `]` is part of the class
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        if chars[j] == ']' {
            return Some(j);
        }
        j += 1;
    }
    None
}

/// Unpack decision state for one pack run
#[derive(Debug, Clone, Default)]
pub struct UnpackRules {
    unpack: Option<GlobPattern>,
    unpack_dir: Option<GlobPattern>,
    remembered: Vec<String>,
}

impl UnpackRules {
    pub fn new(unpack: Option<&str>, unpack_dir: Option<&str>) -> Result<Self> {
        let compile = |p: Option<&str>| -> Result<Option<GlobPattern>> {
            match p.filter(|p| !p.is_empty()) {
                Some(p) => Ok(Some(GlobPattern::new(p)?)),
                None => Ok(None),
            }
        };
        Ok(UnpackRules {
            unpack: compile(unpack)?,
            unpack_dir: compile(unpack_dir)?,
            remembered: Vec::new(),
        })
    }

    /// Decision for a directory at the root-relative `rel`
    pub fn for_directory(&mut self, rel: &str) -> bool {
        self.matches_dir(rel)
    }

    /// Decision for a file or link at the root-relative `rel`
    pub fn for_entry(&mut self, rel: &str) -> bool {
        let (parent, name) = match rel.rfind('/') {
            Some(idx) => (&rel[..idx], &rel[idx + 1..]),
            None => ("", rel),
        };
        let by_name = self.unpack.as_ref().is_some_and(|glob| glob.matches(name));
        by_name || self.matches_dir(parent)
    }

    fn matches_dir(&mut self, dir: &str) -> bool {
        let Some(glob) = &self.unpack_dir else {
            return false;
        };
        if dir.is_empty() {
            return false;
        }

        if dir.starts_with(glob.as_str()) || glob.matches(dir) {
            if !self.remembered.iter().any(|d| d == dir) {
                debug!("Remembering unpacked directory {}", dir);
                self.remembered.push(dir.to_string());
            }
            return true;
        }

        self.remembered.iter().any(|up| {
            dir.len() > up.len() && dir.starts_with(up.as_str()) && dir.as_bytes()[up.len()] == b'/'
        })
    }
}
