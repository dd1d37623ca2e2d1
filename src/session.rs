//! Runs source units through scan → parse → resolve → interpret.
//!
//! A `Session` owns one interpreter, so globals and closures survive from one
//! `run` to the next.  That is what the REPL relies on; file mode simply runs
//! a single unit.

use std::fmt;
use std::io::Write;
use std::thread;

use log::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// Process exit status after a lexical, syntax or resolution error.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Process exit status after a runtime error.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Stack reserved for the thread that runs Lox code.  Parsing, resolution and
/// evaluation all recurse; this leaves room for [`MAX_CALL_DEPTH`] nested
/// calls plus the parser's nesting limit even in unoptimised builds.
///
/// [`MAX_CALL_DEPTH`]: crate::interpreter::MAX_CALL_DEPTH
pub const STACK_SIZE: usize = 256 * 1024 * 1024;

/// Run `job` to completion on a fresh thread with [`STACK_SIZE`] bytes of
/// stack.  Sessions are not `Send`, so build the session inside `job`.
pub fn with_large_stack<F, T>(job: F) -> crate::error::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = thread::Builder::new()
        .name("rox-session".into())
        .stack_size(STACK_SIZE)
        .spawn(job)?;

    handle
        .join()
        .map_err(|_| LoxError::Internal("session thread panicked".into()))
}

/// Why a source unit did not run to completion.
#[derive(Debug)]
pub enum Failure {
    /// Scan, parse or resolve errors.  Nothing was executed.
    Static(Diagnostics),

    /// Execution started and stopped at this error.
    Runtime(LoxError),
}

impl Failure {
    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::Static(_) => EXIT_STATIC_ERROR,
            Failure::Runtime(_) => EXIT_RUNTIME_ERROR,
        }
    }

    /// Every error carried, in report order.
    pub fn errors(&self) -> Vec<&LoxError> {
        match self {
            Failure::Static(diagnostics) => diagnostics.iter().collect(),
            Failure::Runtime(error) => vec![error],
        }
    }
}

impl fmt::Display for Failure {
    /// One diagnostic per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.errors().iter().map(|e| e.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

pub struct Session {
    interpreter: Interpreter,
    next_id: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session whose `print` output goes to stdout.
    pub fn new() -> Self {
        Self::from_interpreter(Interpreter::new())
    }

    /// A session whose `print` output goes to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self::from_interpreter(Interpreter::with_output(out))
    }

    fn from_interpreter(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            next_id: 0,
        }
    }

    /// Run one source unit.  Static errors suppress execution entirely.
    pub fn run(&mut self, source: &str) -> Result<(), Failure> {
        info!("Running source unit of {} bytes", source.len());

        let mut diagnostics = Diagnostics::new();

        let tokens = Scanner::new(source).scan_all(&mut diagnostics);

        let statements = {
            let mut parser = Parser::new(&tokens, &mut diagnostics).with_first_id(self.next_id);
            let statements = parser.parse();
            self.next_id = parser.next_free_id();
            statements
        };

        // Resolving a tree with syntax errors would only add noise.
        if diagnostics.has_errors() {
            debug!("Skipping resolution: {} syntax error(s)", diagnostics.len());
            return Err(Failure::Static(diagnostics));
        }

        Resolver::new(&mut self.interpreter, &mut diagnostics).resolve(&statements);

        if diagnostics.has_errors() {
            return Err(Failure::Static(diagnostics));
        }

        self.interpreter
            .interpret(&statements)
            .map_err(Failure::Runtime)
    }
}
