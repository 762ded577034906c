use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures raised by the binary codec when a read runs past the payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("insufficient payload: requested {requested} bytes, {remaining} remaining")]
    Insufficient { requested: usize, remaining: usize },

    #[error("negative string length: {0}")]
    NegativeLength(i32),

    #[error("string of {0} bytes does not fit an i32 length prefix")]
    StringTooLong(usize),
}

#[derive(Error, Debug)]
pub enum AsarError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed binary buffer: {0}")]
    Codec(#[from] CodecError),

    #[error("Corrupt archive: {0}")]
    Format(String),

    #[error("Invalid header JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{entry}: \"{target}\" resolves outside of the permitted root")]
    Escape { entry: String, target: String },

    #[error("{}: file size {size} can not be larger than 4.2GB", path.display())]
    FileTooLarge { path: PathBuf, size: u64 },

    #[error("\"{0}\" was not found in this archive")]
    NotFound(String),

    #[error("\"{0}\" is not a file")]
    NotAFile(String),

    #[error("\"{0}\": too many levels of links")]
    LinkLoop(String),

    #[error("Invalid unpack pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl AsarError {
    /// Security failures are reported apart from ordinary I/O
    pub fn is_escape(&self) -> bool {
        matches!(self, AsarError::Escape { .. })
    }

    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AsarError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AsarError>;

/// Attach the offending path to a bare `std::io::Result`
pub trait IoResultExt<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| AsarError::io(path, source))
    }
}
