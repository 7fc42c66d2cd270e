//! Filesystem operation errors

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;

/// Category of a failed filesystem operation.
///
/// The tag is part of the API contract: it is reported verbatim to clients as
/// the `error` field of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    UnableToCheckExistence,
    UnableToReadFile,
    UnableToWriteFile,
    UnableToDeleteFile,
    UnableToDeleteDirectory,
    UnableToCreateDirectory,
    UnableToSetVisibility,
    UnableToRetrieveMetadata,
    UnableToListContents,
    UnableToMoveFile,
    UnableToCopyFile,
    PathTraversalDetected,
    CorruptedPathDetected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnableToCheckExistence => "UnableToCheckExistence",
            FailureKind::UnableToReadFile => "UnableToReadFile",
            FailureKind::UnableToWriteFile => "UnableToWriteFile",
            FailureKind::UnableToDeleteFile => "UnableToDeleteFile",
            FailureKind::UnableToDeleteDirectory => "UnableToDeleteDirectory",
            FailureKind::UnableToCreateDirectory => "UnableToCreateDirectory",
            FailureKind::UnableToSetVisibility => "UnableToSetVisibility",
            FailureKind::UnableToRetrieveMetadata => "UnableToRetrieveMetadata",
            FailureKind::UnableToListContents => "UnableToListContents",
            FailureKind::UnableToMoveFile => "UnableToMoveFile",
            FailureKind::UnableToCopyFile => "UnableToCopyFile",
            FailureKind::PathTraversalDetected => "PathTraversalDetected",
            FailureKind::CorruptedPathDetected => "CorruptedPathDetected",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A failed filesystem operation
///
/// Carries the failure category, the location it applies to, a backend-defined
/// numeric code (the OS error code for local I/O, `0` otherwise) and the cause.
#[derive(Debug, Error)]
#[error("{kind} at location \"{location}\": {reason}")]
pub struct FilesystemError {
    kind: FailureKind,
    location: String,
    reason: String,
    code: i64,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl FilesystemError {
    pub fn new(kind: FailureKind, location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            reason: reason.into(),
            code: 0,
            source: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Build from an I/O error, keeping its OS error code.
    pub fn from_io(kind: FailureKind, location: impl Into<String>, err: std::io::Error) -> Self {
        let code = err.raw_os_error().map(i64::from).unwrap_or(0);
        Self::new(kind, location, err.to_string())
            .with_code(code)
            .with_source(err)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    /// The full message: the failure summary followed by every cause.
    pub fn message(&self) -> String {
        let mut message = self.to_string();
        let mut source = StdError::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        message
    }
}

/// Result type for filesystem operations
pub type FilesystemResult<T> = Result<T, FilesystemError>;
