//! End‑to‑end driver: source text → tokens → AST → resolution → execution.
//!
//! A [`Session`] keeps one interpreter alive, so globals defined by one
//! [`Session::run`] are visible to the next.  Reference ids are numbered
//! across runs so resolution tables from different programs never collide.

use log::{debug, info};

use crate::ast::Stmt;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{self, ResolutionTable};
use crate::scanner::Scanner;
use crate::sink::DiagnosticSink;
use crate::token::Token;

/// Result of one [`Session::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,

    /// Lex, parse or resolve errors; nothing was executed.
    CompileError,

    /// Execution started and was aborted by a runtime error.
    RuntimeError,
}

impl Outcome {
    /// Conventional process exit status (sysexits `EX_DATAERR` /
    /// `EX_SOFTWARE`).
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::CompileError => 65,
            Outcome::RuntimeError => 70,
        }
    }
}

/// Scan the whole source, splitting tokens from lexical errors.
pub fn scan(source: &str) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    (tokens, errors)
}

pub struct Session<D: DiagnosticSink> {
    interpreter: Interpreter,
    diagnostics: D,
    next_id: usize,
}

impl<D: DiagnosticSink> Session<D> {
    pub fn new(interpreter: Interpreter, diagnostics: D) -> Self {
        info!("Session started");

        Self {
            interpreter,
            diagnostics,
            next_id: 0,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Scan, parse and resolve.  Every compile error is reported; `None`
    /// means at least one was found.
    pub fn compile(&mut self, source: &str) -> Option<(Vec<Stmt>, ResolutionTable)> {
        let (tokens, lex_errors) = scan(source);
        debug!(
            "Scanned {} token(s), {} lex error(s)",
            tokens.len(),
            lex_errors.len()
        );

        let mut parser = Parser::new(tokens).with_first_id(self.next_id);
        let parsed = parser.parse();
        self.next_id = parser.next_id();

        let mut failed = self.report_compile_errors(&lex_errors);

        let statements = match parsed {
            Ok(statements) => statements,
            Err(parse_errors) => {
                self.report_compile_errors(&parse_errors);
                return None;
            }
        };

        if failed {
            return None;
        }

        let resolution = resolver::resolve(&statements);
        failed = self.report_compile_errors(&resolution.errors);

        if failed {
            None
        } else {
            Some((statements, resolution.table))
        }
    }

    /// Compile and execute `source`.
    pub fn run(&mut self, source: &str) -> Outcome {
        let Some((statements, table)) = self.compile(source) else {
            info!("Compilation failed; not executing");
            return Outcome::CompileError;
        };

        match self.interpreter.interpret(&statements, &table) {
            Ok(()) => Outcome::Success,
            Err(e) => {
                debug!("Runtime error: {}", e);

                self.diagnostics
                    .report_runtime_error(e.line(), e.message());
                Outcome::RuntimeError
            }
        }
    }

    fn report_compile_errors(&mut self, errors: &[LoxError]) -> bool {
        for e in errors {
            self.diagnostics
                .report_compile_error(e.line(), e.message());
        }

        !errors.is_empty()
    }
}
