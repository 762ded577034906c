//! Content integrity records
//!
//! Every file gets one SHA-256 digest over its whole content plus one digest
//! per 4 MiB block. The record is written into the header verbatim.

use crate::error::{AsarError, IoResultExt, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Algorithm tag stored in every record
pub const ALGORITHM: &str = "SHA256";

/// Fixed block size (4 MiB)
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIntegrity {
    pub algorithm: String,
    /// Hex digest of the whole file
    pub hash: String,
    #[serde(rename = "blockSize")]
    pub block_size: u32,
    /// Hex digests of each block, in order
    pub blocks: Vec<String>,
}

/// Hash everything `reader` yields
///
/// The block buffer only grows as far as the input does and is reused
/// between blocks.
pub fn compute_integrity<R: Read>(mut reader: R) -> std::io::Result<FileIntegrity> {
    let mut whole = Sha256::new();
    let mut blocks = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = (&mut reader).take(BLOCK_SIZE as u64).read_to_end(&mut buf)?;
        if n == 0 {
            break;
        }
        blocks.push(hex::encode(Sha256::digest(&buf)));
        whole.update(&buf);
        if n < BLOCK_SIZE {
            break;
        }
    }

    Ok(FileIntegrity {
        algorithm: ALGORITHM.to_string(),
        hash: hex::encode(whole.finalize()),
        block_size: BLOCK_SIZE as u32,
        blocks,
    })
}

/// Hash the file at `path`
pub fn file_integrity(path: &Path) -> Result<FileIntegrity> {
    let file = File::open(path).with_path(path)?;
    compute_integrity(file).map_err(|e| AsarError::io(path, e))
}
