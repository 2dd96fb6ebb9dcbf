//! Centralised error hierarchy for the **Rox interpreter**.
//!
//! The scanner, parser, resolver and runtime report their failures as one of
//! the variants defined here, behind a crate-wide `Result<T>` alias.  The
//! binary wraps them in `anyhow` at the edge.
//!
//! The module **does not** print diagnostics itself; that is the job of a
//! [`DiagnosticSink`](crate::sink::DiagnosticSink).
//!
//! `break` and `return` are *not* errors: they travel as
//! [`Flow`](crate::interpreter::Flow) values and never show up here.

use std::fmt;

use log::info;
use serde::Serialize;
use thiserror::Error;

/// Classification of runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuntimeErrorKind {
    /// Operand(s) of the wrong type for an operator.
    TypeError,

    /// Undefined variable or property.
    NameError,

    /// Call with the wrong number of arguments.
    ArityError,

    /// Division where the divisor is exactly zero.
    DivisionByZero,

    /// Call on a value without the callable capability.
    NotCallable,

    /// Property access on something that is not an instance.
    NotAnInstance,

    /// `class A < B` where `B` is not a class.
    SuperclassNotAClass,

    /// Call nesting passed the interpreter's depth limit.
    StackOverflow,

    /// Engine defect: missing resolved binding or an escaped control signal.
    Internal,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeErrorKind::TypeError => "TypeError",
            RuntimeErrorKind::NameError => "NameError",
            RuntimeErrorKind::ArityError => "ArityError",
            RuntimeErrorKind::DivisionByZero => "DivisionByZero",
            RuntimeErrorKind::NotCallable => "NotCallable",
            RuntimeErrorKind::NotAnInstance => "NotAnInstance",
            RuntimeErrorKind::SuperclassNotAClass => "SuperclassNotAClass",
            RuntimeErrorKind::StackOverflow => "StackOverflow",
            RuntimeErrorKind::Internal => "Internal",
        };

        f.write_str(name)
    }
}

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Static‑analysis failure found by the resolver.
    #[error("[line {line}] Error: {message}")]
    Resolve { message: String, line: usize },

    /// Runtime evaluation error.  Aborts the current run.
    #[error("{message}\n[line {line}]")]
    Runtime {
        kind: RuntimeErrorKind,
        message: String,
        line: usize,
    },
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        LoxError::Parse { message, line }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        LoxError::Resolve { message, line }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(kind: RuntimeErrorKind, line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Runtime error: kind={}, line={}, msg={}",
            kind, line, message
        );

        LoxError::Runtime {
            kind,
            message,
            line,
        }
    }

    /// Source line the error points at.
    pub fn line(&self) -> usize {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => *line,
        }
    }

    /// Runtime classification, `None` for static errors.
    pub fn runtime_kind(&self) -> Option<RuntimeErrorKind> {
        match self {
            LoxError::Runtime { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Bare message without the line decoration added by `Display`.
    pub fn message(&self) -> &str {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => message,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
