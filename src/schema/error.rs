//! Schema validation errors

use std::fmt;
use thiserror::Error;

/// One step into a JSON document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a field inside the configuration payload,
/// rendered as `sections[1].services[0].url`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_string()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// A configuration payload that does not match the schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Payload is not JSON at all
    #[error("Malformed payload: {0}")]
    Syntax(String),

    /// Required field absent (or null)
    #[error("Missing required field `{path}`")]
    Missing { path: FieldPath },

    /// Field present with the wrong primitive kind
    #[error("Field `{path}` must be {expected}, found {found}")]
    WrongType {
        path: FieldPath,
        expected: &'static str,
        found: &'static str,
    },

    /// Field has the right kind but an unacceptable value
    #[error("Field `{path}` is invalid: {reason}")]
    Invalid { path: FieldPath, reason: String },
}

impl ValidationError {
    /// Offending field, if the error is tied to one
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            ValidationError::Syntax(_) => None,
            ValidationError::Missing { path }
            | ValidationError::WrongType { path, .. }
            | ValidationError::Invalid { path, .. } => Some(path),
        }
    }
}

/// Result type alias for schema operations
pub type ValidationResult<T> = Result<T, ValidationError>;
