//! Listing and metadata entries.

use serde_json::{Map, Value};
use storegate_core::Visibility;

#[derive(Debug, Clone, PartialEq)]
pub struct FileAttributes {
    pub path: String,
    pub file_size: Option<u64>,
    pub visibility: Option<Visibility>,
    pub last_modified: Option<i64>,
    pub mime_type: Option<String>,
    pub extra_metadata: Map<String, Value>,
}

impl FileAttributes {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_size: None,
            visibility: None,
            last_modified: None,
            mime_type: None,
            extra_metadata: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryAttributes {
    pub path: String,
    pub visibility: Option<Visibility>,
    pub last_modified: Option<i64>,
    pub extra_metadata: Map<String, Value>,
}

impl DirectoryAttributes {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            visibility: None,
            last_modified: None,
            extra_metadata: Map::new(),
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageAttributes {
    File(FileAttributes),
    Directory(DirectoryAttributes),
}

impl StorageAttributes {
    pub fn type_name(&self) -> &'static str {
        match self {
            StorageAttributes::File(_) => "file",
            StorageAttributes::Directory(_) => "dir",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            StorageAttributes::File(f) => &f.path,
            StorageAttributes::Directory(d) => &d.path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, StorageAttributes::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, StorageAttributes::Directory(_))
    }

    pub fn visibility(&self) -> Option<Visibility> {
        match self {
            StorageAttributes::File(f) => f.visibility,
            StorageAttributes::Directory(d) => d.visibility,
        }
    }

    pub fn last_modified(&self) -> Option<i64> {
        match self {
            StorageAttributes::File(f) => f.last_modified,
            StorageAttributes::Directory(d) => d.last_modified,
        }
    }

    pub fn extra_metadata(&self) -> &Map<String, Value> {
        match self {
            StorageAttributes::File(f) => &f.extra_metadata,
            StorageAttributes::Directory(d) => &d.extra_metadata,
        }
    }

    /// Replace the visibility, keeping everything else.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        match &mut self {
            StorageAttributes::File(f) => f.visibility = Some(visibility),
            StorageAttributes::Directory(d) => d.visibility = Some(visibility),
        }
        self
    }
}
