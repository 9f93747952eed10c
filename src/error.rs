//! Custom error types and result handling for Kyocho operations.
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Failures are fatal for the run: the pipeline
//! never retries and never publishes a partially written package.
//!
use std::path::PathBuf;

/// Type alias for Results with Kyocho errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Kyocho operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// ZIP container errors (unreadable or malformed archive)
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// XML reader errors while parsing package or content documents
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    /// Regular expression compilation errors
    #[error(transparent)]
    Regex(#[from] regex::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    /// Failure to build the worker pool used for item transforms
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// Failure to move the finished temporary package to its final name
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
    #[error(transparent)]
    KyochoBuilder(#[from] crate::kyocho::KyochoConfigBuilderError),
    /// The container could not be opened as an EPUB package
    #[error("Invalid package: {0}")]
    InvalidPackage(String),
    /// A selected content document is not valid UTF-8 text or well-formed markup
    #[error("Failed to decode content item '{item}': {reason}")]
    Decode { item: String, reason: String },
    /// Structural problem in a markup document (unbalanced or unclosed elements)
    #[error("Malformed markup: {0}")]
    Markup(String),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// A path could not be represented as UTF-8
    #[error("Path '{0:?}' is not valid UTF-8")]
    PathUtf8Error(PathBuf),
    /// A path exceeds the platform limit
    #[error("Path '{0:?}' is too long")]
    PathTooLong(PathBuf),
    /// The output file exists and overwriting was not requested
    #[error("Output file already exists: {0:?}")]
    AlreadyExists(PathBuf),
    /// Error for failed asynchronous tasks
    #[error("Asynchronous task failed: {0}")]
    AsyncTaskError(String),
    /// Error for resources that couldn't be found (e.g., source file)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Wraps any error raised while handling a content item as a [`Error::Decode`].
    pub(crate) fn decode(item: &str, reason: impl std::fmt::Display) -> Self {
        Error::Decode {
            item: item.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
