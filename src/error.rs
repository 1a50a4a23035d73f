use std::path::PathBuf;

use crate::syntax::SyntaxError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, SwagError>;

/// Everything that can go wrong while building a document.
#[derive(Debug, thiserror::Error)]
pub enum SwagError {
    /// A reference to a type that is neither primitive nor declared anywhere in the corpus.
    #[error("cannot find type definition: {0}")]
    UnresolvedType(String),

    /// Re-entering a struct that is still being resolved; the chain ends with the repeated type.
    #[error("recursively parsing struct: {}", .chain.join(" -> "))]
    RecursiveStruct { chain: Vec<String> },

    #[error("{message}")]
    MalformedAnnotation { message: String },

    #[error("{constraint} is not supported for {schema_type} field")]
    ConstraintTypeMismatch {
        constraint: String,
        schema_type: String,
    },

    #[error("circular constant reference: {0}")]
    CircularConstant(String),

    #[error("unsupported field type: {0}")]
    UnsupportedField(String),

    /// Internal signal: the field is overridden away and must be omitted.
    #[error("field skipped: {0}")]
    SkippedField(String),

    #[error("failed to parse {}: {source}", .file.display())]
    Syntax {
        file: PathBuf,
        #[source]
        source: SyntaxError,
    },

    #[error("route {method} {path} is declared multiple times")]
    DuplicateRoute { method: String, path: String },

    #[error("duplicated @id annotation '{0}'")]
    DuplicateOperationId(String),

    #[error("dependency listing failed: {0}")]
    Dependency(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SwagError {
    pub fn malformed(message: impl Into<String>) -> Self {
        SwagError::MalformedAnnotation {
            message: message.into(),
        }
    }

    pub fn mismatch(constraint: impl Into<String>, schema_type: impl Into<String>) -> Self {
        SwagError::ConstraintTypeMismatch {
            constraint: constraint.into(),
            schema_type: schema_type.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SwagError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps the error with the annotation line that produced it.
    pub fn in_comment(self, comment: &str) -> Self {
        match self {
            SwagError::MalformedAnnotation { message } => SwagError::MalformedAnnotation {
                message: format!("{} in comment {:?}", message, comment.trim()),
            },
            other => other,
        }
    }
}
