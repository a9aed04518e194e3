use crate::codegen::errors::SemaError;
use crate::span::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Syntax error: {msg}")]
    Syntax { msg: String, span: Span },

    /// A lowering failure inside a function body.
    #[error("in function '{func}': {source}")]
    Lower { func: String, source: SemaError },

    /// A lowering failure outside any function (top-level expression statements).
    #[error("{source}")]
    LowerGlobal { source: SemaError },

    /// The IR verifier rejected a function; `msg` includes the offending dump.
    #[error("IR verification failed: {msg}")]
    Verify { msg: String },

    #[error("Codegen error: {msg}")]
    Codegen { msg: String },

    #[error("JIT error: {msg}")]
    Jit { msg: String },

    #[error("IO error: {msg}")]
    Io { msg: String },
}

impl CompileError {
    pub fn syntax(msg: impl Into<String>, span: Span) -> Self {
        Self::Syntax { msg: msg.into(), span }
    }

    pub fn lower(func: impl Into<String>, source: SemaError) -> Self {
        Self::Lower { func: func.into(), source }
    }

    pub fn codegen(msg: impl Into<String>) -> Self {
        Self::Codegen { msg: msg.into() }
    }

    pub fn jit(msg: impl Into<String>) -> Self {
        Self::Jit { msg: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io { msg: msg.into() }
    }
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(source: &str, _filename: &str, err: &CompileError) {
    use ariadne::{Label, Report, ReportKind, Source};

    match err {
        CompileError::Syntax { msg, span } => {
            Report::build(ReportKind::Error, (), span.start)
                .with_message("syntax error")
                .with_label(
                    Label::new(span.start..span.end)
                        .with_message(msg),
                )
                .finish()
                .eprint(Source::from(source))
                .unwrap();
        }
        CompileError::Lower { func, source: sema } => {
            let span = sema.span();
            let mut report = Report::build(ReportKind::Error, (), span.start)
                .with_message(format!("cannot compile function '{func}'"))
                .with_label(
                    Label::new(span.start..span.end)
                        .with_message(sema.to_string()),
                );
            if let Some(stmt) = sema.statement_span() {
                if stmt != span {
                    report = report.with_label(
                        Label::new(stmt.start..stmt.end)
                            .with_message("in this statement"),
                    );
                }
            }
            report.finish().eprint(Source::from(source)).unwrap();
        }
        CompileError::LowerGlobal { source: sema } => {
            let span = sema.span();
            Report::build(ReportKind::Error, (), span.start)
                .with_message("cannot compile global")
                .with_label(
                    Label::new(span.start..span.end)
                        .with_message(sema.to_string()),
                )
                .finish()
                .eprint(Source::from(source))
                .unwrap();
        }
        CompileError::Verify { msg }
        | CompileError::Codegen { msg }
        | CompileError::Jit { msg }
        | CompileError::Io { msg } => {
            eprintln!("error: {msg}");
        }
    }
}
