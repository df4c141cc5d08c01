//! Document and collection addressing.
//!
//! # Invariants
//! - Paths alternate collection and document segments, starting with a
//!   collection. A `CollectionPath` has an odd segment count, a `DocPath` an
//!   even one.
//! - Every segment matches `[A-Za-z0-9_.-]+`.

use super::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid segment regex"));
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field regex"));

/// Address of a collection, e.g. `semesters` or `students/{id}/semesters`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

/// Address of one document, e.g. `metadata/config`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// Creates a top-level collection path.
    pub fn root(name: &str) -> StoreResult<Self> {
        validate_segment(name)?;
        Ok(Self {
            segments: vec![name.to_string()],
        })
    }

    /// Parses a slash separated collection path.
    pub fn parse(value: &str) -> StoreResult<Self> {
        let segments = split_segments(value)?;
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!(
                "`{value}` does not address a collection"
            )));
        }
        Ok(Self { segments })
    }

    /// Returns the document path for `id` inside this collection.
    pub fn doc(&self, id: &str) -> StoreResult<DocPath> {
        validate_segment(id)?;
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        Ok(DocPath { segments })
    }

    /// Last segment, the collection's own name.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn as_string(&self) -> String {
        self.segments.join("/")
    }
}

impl DocPath {
    /// Parses a slash separated document path.
    pub fn parse(value: &str) -> StoreResult<Self> {
        let segments = split_segments(value)?;
        if segments.len() % 2 != 0 {
            return Err(StoreError::InvalidPath(format!(
                "`{value}` does not address a document"
            )));
        }
        Ok(Self { segments })
    }

    /// Document id, the last path segment.
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Collection that owns this document.
    pub fn parent(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// Returns a nested collection under this document.
    pub fn collection(&self, name: &str) -> StoreResult<CollectionPath> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(CollectionPath { segments })
    }

    pub fn as_string(&self) -> String {
        self.segments.join("/")
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Rejects field names that cannot be used in filters or ordering.
pub(crate) fn validate_field(field: &str) -> StoreResult<()> {
    if FIELD_RE.is_match(field) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(format!(
            "invalid field name `{field}`"
        )))
    }
}

fn validate_segment(segment: &str) -> StoreResult<()> {
    if SEGMENT_RE.is_match(segment) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(format!(
            "invalid path segment `{segment}`"
        )))
    }
}

fn split_segments(value: &str) -> StoreResult<Vec<String>> {
    let trimmed = value.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidPath("path cannot be empty".to_string()));
    }
    trimmed
        .split('/')
        .map(|segment| validate_segment(segment).map(|()| segment.to_string()))
        .collect()
}
