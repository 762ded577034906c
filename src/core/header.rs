//! On-disk header framing
//!
//! ```text
//! [size pickle: 8 bytes][header pickle: header_size bytes][packed bytes]
//! ```
//!
//! The size pickle holds one u32, the byte length of the header pickle. The
//! header pickle holds one string, the namespace JSON.

use crate::error::{AsarError, IoResultExt, Result};
use crate::namespace::Namespace;
use crate::pickle::Pickle;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Length of the size pickle at the start of every archive
pub const SIZE_FIELD_LEN: u64 = 8;

/// Parsed header of an archive on disk
#[derive(Debug, Clone)]
pub struct ArchiveHeader {
    pub namespace: Namespace,
    /// Header JSON exactly as stored
    pub header_string: String,
    /// Byte length of the header pickle
    pub header_size: u32,
}

impl ArchiveHeader {
    /// Absolute position of the packed region in the archive file
    pub fn data_start(&self) -> u64 {
        SIZE_FIELD_LEN + u64::from(self.header_size)
    }
}

/// Frame header JSON as size pickle followed by header pickle
pub fn encode_header(json: &str) -> Result<Vec<u8>> {
    let mut header = Pickle::new();
    header.write_string(json)?;
    let header = header.into_bytes();

    let header_len = u32::try_from(header.len())
        .map_err(|_| AsarError::Format(format!("header of {} bytes is too large", header.len())))?;
    let mut size = Pickle::new();
    size.write_u32(header_len);

    let mut out = size.into_bytes();
    out.extend_from_slice(&header);
    Ok(out)
}

/// Decode the size pickle
pub fn parse_header_size(bytes: &[u8]) -> Result<u32> {
    Pickle::from_bytes(bytes.to_vec()).iter().read_u32()
}

/// Decode the header pickle into its JSON string and tree
pub fn parse_header(bytes: Vec<u8>) -> Result<(String, Namespace)> {
    let json = Pickle::from_bytes(bytes).iter().read_string()?;
    let namespace = Namespace::from_json(&json)?;
    Ok((json, namespace))
}

/// Read and parse the header of the archive at `path`
pub fn read_archive_header(path: &Path) -> Result<ArchiveHeader> {
    let mut file = File::open(path).with_path(path)?;
    let file_len = file.metadata().with_path(path)?.len();

    let mut size_buf = [0u8; SIZE_FIELD_LEN as usize];
    read_exact(&mut file, &mut size_buf, path, "unable to read header size")?;
    let header_size = parse_header_size(&size_buf)?;

    if SIZE_FIELD_LEN + u64::from(header_size) > file_len {
        return Err(AsarError::Format(format!(
            "header size {} exceeds archive length {}",
            header_size, file_len
        )));
    }

    let mut header_buf = vec![0u8; header_size as usize];
    read_exact(&mut file, &mut header_buf, path, "unable to read header")?;
    let (header_string, namespace) = parse_header(header_buf)?;

    Ok(ArchiveHeader {
        namespace,
        header_string,
        header_size,
    })
}

fn read_exact(file: &mut File, buf: &mut [u8], path: &Path, what: &str) -> Result<()> {
    match file.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(AsarError::Format(what.to_string())),
        Err(e) => Err(AsarError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use tempfile::TempDir;

    #[test]
    fn test_encode_layout() {
        let json = r#"{"files":{}}"#;
        let bytes = encode_header(json).unwrap();

        // size pickle: payload length 4, then the header pickle length
        assert_eq!(&bytes[..4], &4u32.to_le_bytes());
        let header_size = parse_header_size(&bytes[..8]).unwrap();
        assert_eq!(header_size as usize, bytes.len() - 8);
        assert_eq!(header_size % 4, 0);

        let (parsed, ns) = parse_header(bytes[8..].to_vec()).unwrap();
        assert_eq!(parsed, json);
        assert!(ns.walk().is_empty());
    }

    #[test]
    fn test_truncated_header_is_fatal() {
        let bytes = encode_header(r#"{"files":{}}"#).unwrap();
        let cut = bytes[8..bytes.len() - 4].to_vec();
        let err = parse_header(cut).unwrap_err();
        assert!(matches!(
            err,
            AsarError::Codec(CodecError::Insufficient { .. })
        ));
    }

    #[test]
    fn test_read_archive_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.asar");
        let mut bytes = encode_header(r#"{"files":{"a":{"size":2,"offset":"0"}}}"#).unwrap();
        bytes.extend_from_slice(b"hi");
        std::fs::write(&path, &bytes).unwrap();

        let header = read_archive_header(&path).unwrap();
        assert_eq!(header.data_start() as usize, bytes.len() - 2);
        assert_eq!(header.namespace.get_file("a", false).unwrap().size, 2);
    }

    #[test]
    fn test_short_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.asar");

        std::fs::write(&path, [4u8, 0, 0]).unwrap();
        let err = read_archive_header(&path).unwrap_err();
        assert!(err.to_string().contains("unable to read header size"));

        // declares far more header than the file holds
        let mut bytes = vec![4u8, 0, 0, 0];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            read_archive_header(&path),
            Err(AsarError::Format(_))
        ));
    }

    #[test]
    fn test_missing_archive_is_io() {
        let err = read_archive_header(Path::new("/nope/missing.asar")).unwrap_err();
        assert!(matches!(err, AsarError::Io { .. }));
    }
}
