use crate::span::Span;
use thiserror::Error;

/// Semantic errors raised by the lowering engine. Expression-level failures
/// bubble unchanged until the enclosing statement wraps them once in
/// `Statement`, which records the statement's source slice for context.
#[derive(Debug, Error)]
pub enum SemaError {
    #[error("unknown variable '{name}'")]
    MissingVar { name: String, span: Span },

    #[error("called value has type {ty}, which is not a function")]
    NotAFunction { ty: String, span: Span },

    #[error("cannot convert {ty} to bool")]
    CantBool { ty: String, span: Span },

    #[error("call passes {got} argument(s) but the function takes {want}")]
    WrongArgCount { got: usize, want: usize, span: Span },

    #[error("type mismatch in {what}: expected {expected}, found {got}")]
    BadType {
        /// The producing node kind, so the message cites the right place.
        what: &'static str,
        expected: String,
        got: String,
        span: Span,
    },

    #[error("{what} does not denote a storage location")]
    NotAssignable { what: &'static str, span: Span },

    #[error("unknown type '{name}'")]
    UnknownType { name: String, span: Span },

    #[error("function '{func}' does not end with a return statement")]
    MissingReturn { func: String, span: Span },

    #[error("{what} is not supported yet")]
    Unsupported { what: &'static str, span: Span },

    #[error("{inner}")]
    Statement { span: Span, inner: Box<SemaError> },
}

impl SemaError {
    /// Span of the failing expression or declaration (the innermost error).
    pub fn span(&self) -> Span {
        match self {
            SemaError::MissingVar { span, .. }
            | SemaError::NotAFunction { span, .. }
            | SemaError::CantBool { span, .. }
            | SemaError::WrongArgCount { span, .. }
            | SemaError::BadType { span, .. }
            | SemaError::NotAssignable { span, .. }
            | SemaError::UnknownType { span, .. }
            | SemaError::MissingReturn { span, .. }
            | SemaError::Unsupported { span, .. } => *span,
            SemaError::Statement { inner, .. } => inner.span(),
        }
    }

    /// Span of the enclosing statement, when the error crossed one.
    pub fn statement_span(&self) -> Option<Span> {
        match self {
            SemaError::Statement { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Wrap at a statement boundary; errors that already carry statement
    /// context pass through unchanged.
    pub fn into_statement(self, span: Span) -> SemaError {
        match self {
            err @ SemaError::Statement { .. } => err,
            inner => SemaError::Statement { span, inner: Box::new(inner) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_wrapping_is_one_shot() {
        let err = SemaError::MissingVar { name: "x".into(), span: Span::new(4, 5) };
        let wrapped = err.into_statement(Span::new(0, 10));
        assert_eq!(wrapped.statement_span(), Some(Span::new(0, 10)));
        assert_eq!(wrapped.span(), Span::new(4, 5));

        // a second boundary leaves the first wrapper in place
        let rewrapped = wrapped.into_statement(Span::new(0, 20));
        assert_eq!(rewrapped.statement_span(), Some(Span::new(0, 10)));
    }

    #[test]
    fn statement_wrapper_displays_the_inner_error() {
        let err = SemaError::MissingVar { name: "x".into(), span: Span::new(4, 5) }
            .into_statement(Span::new(0, 10));
        assert_eq!(err.to_string(), "unknown variable 'x'");
    }
}
