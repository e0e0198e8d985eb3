//! Documents, field paths and the record envelopes stored during verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// An arbitrary structured document supplied by the caller.
///
/// Cloning a `Document` is a deep copy, so the workflow never touches the
/// caller's instance.
pub type Document = Map<String, Value>;

/// Maximum number of dotted segments accepted in a [`FieldPath`].
pub const FIELD_PATH_MAX_DEPTH: usize = 2;

/// Errors produced while parsing a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldPathError {
    /// The path was empty or contained an empty segment (`a..b`, `.a`).
    #[error("field path `{0}` contains an empty segment")]
    EmptySegment(String),

    /// The path nests deeper than [`FIELD_PATH_MAX_DEPTH`] levels.
    #[error("field path `{0}` nests more than two levels, which is unsupported")]
    TooDeep(String),
}

/// A dotted path into a [`Document`], e.g. `email` or `contact.email`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path of one or two segments.
    pub fn parse(path: &str) -> Result<Self, FieldPathError> {
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(FieldPathError::EmptySegment(path.to_owned()));
        }
        if segments.len() > FIELD_PATH_MAX_DEPTH {
            return Err(FieldPathError::TooDeep(path.to_owned()));
        }
        Ok(Self { segments })
    }

    /// A path addressing a single top-level key. The key is taken verbatim.
    pub fn key(name: &str) -> Self {
        Self {
            segments: vec![name.to_owned()],
        }
    }

    /// The top-level key this path starts at.
    pub fn root(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Resolve the path inside `document`.
    ///
    /// Returns `None` when any intermediate level is missing or not an object.
    pub fn value_get<'a>(&self, document: &'a Document) -> Option<&'a Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = document;
        for segment in parents {
            current = current.get(segment)?.as_object()?;
        }
        current.get(last)
    }

    /// Resolve the path and require a non-empty string value.
    pub fn string_get<'a>(&self, document: &'a Document) -> Option<&'a str> {
        self.value_get(document)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Remove the value at this path, returning it if present.
    pub fn value_remove(&self, document: &mut Document) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = document;
        for segment in parents {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.remove(last)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Equality filter on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field to compare.
    pub path: FieldPath,
    /// Value the field must equal.
    pub value: Value,
}

impl Filter {
    /// Build an equality filter.
    pub fn eq(path: FieldPath, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }

    /// Whether `document` satisfies this filter.
    pub fn matches(&self, document: &Document) -> bool {
        self.path.value_get(document) == Some(&self.value)
    }
}

/// A candidate document quarantined until its owner confirms the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// Candidate fields plus the verification token field.
    pub document: Document,
    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
    /// When the store drops the record.
    pub expires_at: DateTime<Utc>,
}

impl PendingRecord {
    /// The token currently attached under `token_field`.
    pub fn token(&self, token_field: &FieldPath) -> Option<&str> {
        token_field.string_get(&self.document)
    }

    /// Whether the record has outlived its TTL at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The confirmed form of a candidate document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentRecord {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// Candidate fields, without the verification token.
    pub document: Document,
    /// When the record was confirmed.
    pub created_at: DateTime<Utc>,
}
