//! Hashing error definitions.

use thiserror::Error;

/// Errors raised while canonicalizing or measuring a value.
///
/// `path` points at the offending element, e.g. `messages[0].payload`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// A JSON `null` reached the serializer.
    #[error("null value at {path}")]
    Null { path: String },

    /// Empty arrays have no canonical form.
    #[error("empty array at {path}")]
    EmptyArray { path: String },

    /// Empty objects have no canonical form.
    #[error("empty object at {path}")]
    EmptyObject { path: String },

    /// Lengths are only defined for full units, not stripped ones.
    #[error("cannot measure a stripped unit")]
    StrippedUnit,

    /// A unit lacks a field the hashing rules depend on.
    #[error("unit field '{0}' is missing or malformed")]
    MissingField(&'static str),

    /// A value could not be rendered as JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl HashError {
    /// Prefix the error path with the segment of the enclosing container.
    pub(crate) fn within(self, segment: &str) -> Self {
        let join = |path: String| {
            if path == "$" {
                segment.to_string()
            } else if path.starts_with('[') {
                format!("{}{}", segment, path)
            } else {
                format!("{}.{}", segment, path)
            }
        };
        match self {
            HashError::Null { path } => HashError::Null { path: join(path) },
            HashError::EmptyArray { path } => HashError::EmptyArray { path: join(path) },
            HashError::EmptyObject { path } => HashError::EmptyObject { path: join(path) },
            other => other,
        }
    }
}

/// Result type for hashing operations.
pub type HashResult<T> = Result<T, HashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_composition() {
        let err = HashError::Null { path: "$".into() }
            .within("payload")
            .within("[0]")
            .within("messages");
        assert_eq!(err.to_string(), "null value at messages[0].payload");
    }

    #[test]
    fn test_non_path_errors_pass_through() {
        assert_eq!(HashError::StrippedUnit.within("x"), HashError::StrippedUnit);
    }
}
