//! Location normalization
//!
//! Every location passed into a [`crate::Filesystem`] goes through
//! [`normalize`] before it reaches a backend.

use crate::error::{FailureKind, FilesystemError, FilesystemResult};

/// Normalize a client-supplied location into a backend-relative path.
///
/// Surrounding whitespace is trimmed, `\` becomes `/`, empty and `.` segments
/// are dropped and `..` segments are resolved. A `..` that would climb above
/// the root is rejected, as are control characters anywhere in the location.
pub fn normalize(location: &str) -> FilesystemResult<String> {
    let trimmed = location.trim();
    if trimmed.chars().any(char::is_control) {
        return Err(FilesystemError::new(
            FailureKind::CorruptedPathDetected,
            location,
            "location contains control characters",
        ));
    }

    let unified = trimmed.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(FilesystemError::new(
                        FailureKind::PathTraversalDetected,
                        location,
                        "location escapes the storage root",
                    ));
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

/// Turn a location into the canonical visibility key: `/`-rooted, no trailing slash.
pub fn visibility_key(location: &str) -> String {
    format!("/{}", location.trim_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_and_resolves() {
        assert_eq!(normalize("  /a/b/c.txt ").unwrap(), "a/b/c.txt");
        assert_eq!(normalize("a//b/./c/").unwrap(), "a/b/c");
        assert_eq!(normalize("a\\b\\c").unwrap(), "a/b/c");
        assert_eq!(normalize("a/b/../c").unwrap(), "a/c");
        assert_eq!(normalize("/").unwrap(), "");
        assert_eq!(normalize("").unwrap(), "");
    }

    #[test]
    fn test_normalize_rejects_traversal() {
        let err = normalize("../etc/passwd").unwrap_err();
        assert_eq!(err.kind(), FailureKind::PathTraversalDetected);

        let err = normalize("a/../../b").unwrap_err();
        assert_eq!(err.kind(), FailureKind::PathTraversalDetected);
    }

    #[test]
    fn test_normalize_rejects_control_characters() {
        let err = normalize("a/b\u{0}c").unwrap_err();
        assert_eq!(err.kind(), FailureKind::CorruptedPathDetected);
    }

    #[test]
    fn test_visibility_key() {
        assert_eq!(visibility_key("a/b.txt"), "/a/b.txt");
        assert_eq!(visibility_key("/a/dir/"), "/a/dir");
        assert_eq!(visibility_key(""), "/");
    }
}
