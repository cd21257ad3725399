use crate::types::SourceSpan;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct HostScriptError {
    pub code: String,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl HostScriptError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: Some(span),
        }
    }

    /// Line of the diagnostic, if the error carries a location.
    pub fn line(&self) -> Option<usize> {
        self.span.as_ref().map(|span| span.start.line)
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use crate::types::SourceLocation;

    #[test]
    fn display_includes_code_and_message() {
        let error = HostScriptError::new("RUN_EVAL_ERROR", "boom");
        assert_eq!(error.to_string(), "RUN_EVAL_ERROR: boom");
        assert_eq!(error.line(), None);
    }

    #[test]
    fn with_span_exposes_line() {
        let error = HostScriptError::with_span(
            "COMPILE_SYNTAX",
            "unexpected token",
            SourceSpan::at(SourceLocation { line: 3, column: 7 }),
        );
        assert_eq!(error.line(), Some(3));
    }
}
