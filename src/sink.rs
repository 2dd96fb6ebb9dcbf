//! Where program output and diagnostics go.
//!
//! The engine never writes to stdout/stderr directly: `print` goes through an
//! [`OutputSink`], errors through a [`DiagnosticSink`].  The binary plugs in
//! the std stream implementations; tests plug in the capturing ones.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

/// Destination for `print` statements.
pub trait OutputSink {
    fn print_line(&mut self, text: &str);
}

/// Destination for compile‑time and runtime error reports.
pub trait DiagnosticSink {
    /// Static error; more may follow, execution will not start.
    fn report_compile_error(&mut self, line: usize, message: &str);

    /// Runtime error; the current run has been aborted.
    fn report_runtime_error(&mut self, line: usize, message: &str);
}

/// Writes each printed value on its own line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOutput;

impl OutputSink for StdoutOutput {
    fn print_line(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Keeps printed lines in a shared buffer.  Clones share the buffer, so a
/// test can keep one handle and give the other to the interpreter.
#[derive(Debug, Default, Clone)]
pub struct CapturedOutput {
    lines: Rc<RefCell<Vec<String>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything printed so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl OutputSink for CapturedOutput {
    fn print_line(&mut self, text: &str) {
        debug!("Captured output: {}", text);

        self.lines.borrow_mut().push(text.to_string());
    }
}

/// Reports to stderr in the classic `[line N] Error: ...` layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn report_compile_error(&mut self, line: usize, message: &str) {
        eprintln!("[line {}] Error: {}", line, message);
    }

    fn report_runtime_error(&mut self, line: usize, message: &str) {
        eprintln!("{}\n[line {}]", message, line);
    }
}

/// One collected report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

/// Collects reports for later inspection.
#[derive(Debug, Default, Clone)]
pub struct CollectedDiagnostics {
    pub compile_errors: Vec<Diagnostic>,
    pub runtime_errors: Vec<Diagnostic>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.compile_errors.is_empty() && self.runtime_errors.is_empty()
    }
}

impl DiagnosticSink for CollectedDiagnostics {
    fn report_compile_error(&mut self, line: usize, message: &str) {
        self.compile_errors.push(Diagnostic {
            line,
            message: message.to_string(),
        });
    }

    fn report_runtime_error(&mut self, line: usize, message: &str) {
        self.runtime_errors.push(Diagnostic {
            line,
            message: message.to_string(),
        });
    }
}
