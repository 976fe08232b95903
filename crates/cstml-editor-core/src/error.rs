//! Error types for tree construction, rendering and structural edits.

use miette::{Diagnostic, NamedSource, SourceSpan};

/// Main error type for editor core operations.
///
/// Nothing here is transient: the same inputs always fail the same way, so
/// there is no retry path. `Unsupported` marks grammar shapes the editor does
/// not model yet; `InvariantViolation` marks bookkeeping bugs in the caller.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum EditorError {
    /// A grammar shape the editor does not model.
    #[error("unsupported construct: {0}")]
    #[diagnostic(code(cstml::unsupported))]
    Unsupported(String),

    /// The caller broke an invariant of the rendered tree.
    #[error("invariant violated: {0}")]
    #[diagnostic(
        code(cstml::invariant),
        help("edits must only reference nodes bound by the most recent render")
    )]
    InvariantViolation(String),

    /// The tag stream does not follow the tag grammar.
    #[error("malformed tag stream at tag {index}: {message}")]
    #[diagnostic(code(cstml::malformed_stream))]
    MalformedStream { index: usize, message: String },

    /// Serializer collaborator failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Serialize(#[from] SerializeError),

    /// Parser collaborator failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
}

impl EditorError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        EditorError::Unsupported(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        EditorError::InvariantViolation(message.into())
    }

    pub fn malformed(index: usize, message: impl Into<String>) -> Self {
        EditorError::MalformedStream {
            index,
            message: message.into(),
        }
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;

/// Failure to turn a rebuilt tree back into source text.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("serialization failed: {message}")]
#[diagnostic(code(cstml::serialize))]
pub struct SerializeError {
    pub message: String,
}

impl SerializeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse error with source code location information.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("parse error: {message}")]
#[diagnostic(code(cstml::parse))]
pub struct ParseError {
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    location: SourceSpan,
    #[help]
    advice: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, source: &str, offset: usize, len: usize) -> Self {
        Self {
            message: message.into(),
            src: NamedSource::new("source", source.to_string()),
            location: SourceSpan::new(offset.into(), len),
            advice: None,
        }
    }

    pub fn with_name(mut self, name: impl AsRef<str>) -> Self {
        self.src = NamedSource::new(name, self.src.inner().clone());
        self
    }

    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = Some(advice.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> usize {
        self.location.offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EditorError::unsupported("relocation through a shift reference");
        assert_eq!(
            err.to_string(),
            "unsupported construct: relocation through a shift reference"
        );

        let err = EditorError::malformed(3, "close without open");
        assert_eq!(
            err.to_string(),
            "malformed tag stream at tag 3: close without open"
        );
    }

    #[test]
    fn test_parse_error_location() {
        let err = ParseError::new("unexpected `}`", "[1, }", 4, 1).with_advice("remove it");
        assert_eq!(err.offset(), 4);
        assert_eq!(err.message(), "unexpected `}`");

        let wrapped = EditorError::from(err);
        assert_eq!(wrapped.to_string(), "parse error: unexpected `}`");
        assert_eq!(
            wrapped.code().map(|code| code.to_string()).as_deref(),
            Some("cstml::parse")
        );
        assert!(wrapped.source_code().is_some());
        let labels: Vec<_> = wrapped.labels().into_iter().flatten().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 4);
        assert_eq!(labels[0].label(), Some("here"));
        assert_eq!(
            wrapped.help().map(|help| help.to_string()).as_deref(),
            Some("remove it")
        );
    }

    #[test]
    fn test_serialize_error_keeps_its_code() {
        let wrapped = EditorError::from(SerializeError::new("dangling slot"));
        assert_eq!(wrapped.to_string(), "serialization failed: dangling slot");
        assert_eq!(
            wrapped.code().map(|code| code.to_string()).as_deref(),
            Some("cstml::serialize")
        );
    }
}
