//! Persisted folder tree and file records for folio.
//!
//! This module provides:
//! - Folder nodes stored as a nested-set forest ([`FolderRepository`])
//! - File records mapped 1:1 onto physical files ([`FileRepository`])
//! - In-memory handles ([`FolderNode`], [`FileRecord`]) shared through the
//!   catalog's identity caches

mod folder;
mod metadata;

pub use folder::{
    parent_path, path_name, Access, FolderNode, FolderRepository, FolderRow, FolderUpdate,
    NestedSet, NewFolder,
};
pub use metadata::{
    EntityRef, FileMetadata, FileRecord, FileRepository, FileRow, FileUpdate, NewFile,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;

/// MIME types considered displayable images in a browser.
pub const WEB_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Free-form string attributes stored as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set an attribute, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove an attribute.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterate over attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize to the stored JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl TryFrom<String> for Attributes {
    type Error = serde_json::Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&s)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
