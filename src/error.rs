use std::path::PathBuf;
use thiserror::Error;

/// Main error type for blockpatch
#[derive(Error, Debug)]
pub enum BlockPatchError {
    #[error("expected block not found in {}", .path.display())]
    BlockNotFound { path: PathBuf },

    #[error(
        "expected block occurs {count} times in {} but exactly one was required",
        .path.display()
    )]
    AmbiguousMatch { path: PathBuf, count: usize },

    #[error("expected block must not be empty")]
    EmptyExpectedBlock,

    #[error("IO error: {source}{}", display_path(.path))]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[error("{} is not valid UTF-8: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },

    #[error("content of {} changed between write and verification", .path.display())]
    WriteVerification { path: PathBuf },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" (path: {})", path.display()),
        None => String::new(),
    }
}

impl BlockPatchError {
    /// Create a new block-not-found error
    pub fn block_not_found(path: impl Into<PathBuf>) -> Self {
        Self::BlockNotFound { path: path.into() }
    }

    /// Create a new ambiguous match error
    pub fn ambiguous_match(path: impl Into<PathBuf>, count: usize) -> Self {
        Self::AmbiguousMatch {
            path: path.into(),
            count,
        }
    }

    /// Create a new IO error with path context
    pub fn io_error(err: std::io::Error, path: Option<impl Into<PathBuf>>) -> Self {
        Self::Io {
            source: err,
            path: path.map(|p| p.into()),
        }
    }

    pub fn decode_error(err: std::string::FromUtf8Error, path: impl Into<PathBuf>) -> Self {
        Self::Decode {
            path: path.into(),
            source: err,
        }
    }

    pub fn write_verification(path: impl Into<PathBuf>) -> Self {
        Self::WriteVerification { path: path.into() }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// True when the file's content did not match what the edit assumed.
    ///
    /// These are the errors a caller should read as "the prior state is
    /// stale", as opposed to an environment failure.
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            BlockPatchError::BlockNotFound { .. } | BlockPatchError::AmbiguousMatch { .. }
        )
    }

    /// Short machine-readable tag for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            BlockPatchError::BlockNotFound { .. } => "block_not_found",
            BlockPatchError::AmbiguousMatch { .. } => "ambiguous_match",
            BlockPatchError::EmptyExpectedBlock => "empty_expected_block",
            BlockPatchError::Io { .. } => "io_error",
            BlockPatchError::Decode { .. } => "decode_error",
            BlockPatchError::WriteVerification { .. } => "write_verification",
            BlockPatchError::InvalidArgument { .. } => "invalid_argument",
            BlockPatchError::ParseError { .. } => "parse_error",
        }
    }
}

impl From<std::io::Error> for BlockPatchError {
    fn from(error: std::io::Error) -> Self {
        BlockPatchError::io_error(error, None::<PathBuf>)
    }
}

impl From<serde_json::Error> for BlockPatchError {
    fn from(error: serde_json::Error) -> Self {
        BlockPatchError::parse_error(error.to_string())
    }
}

impl From<serde_yaml::Error> for BlockPatchError {
    fn from(error: serde_yaml::Error) -> Self {
        BlockPatchError::parse_error(error.to_string())
    }
}

impl From<toml::de::Error> for BlockPatchError {
    fn from(error: toml::de::Error) -> Self {
        BlockPatchError::parse_error(error.to_string())
    }
}

/// Result type alias using BlockPatchError
pub type BlockPatchResult<T> = Result<T, BlockPatchError>;

/// Extension trait for attaching a path to fallible IO results
pub trait ErrorExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> BlockPatchResult<T>;
}

impl<T> ErrorExt<T> for Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> BlockPatchResult<T> {
        let path = path.into();
        self.map_err(|e| BlockPatchError::io_error(e, Some(path)))
    }
}

/// Contextual error mapping function
pub fn map_io_err<P: Into<PathBuf>>(path: P) -> impl FnOnce(std::io::Error) -> BlockPatchError {
    let path = path.into();
    move |err| BlockPatchError::io_error(err, Some(path))
}
