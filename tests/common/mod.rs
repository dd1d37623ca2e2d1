#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::diagnostics::Diagnostics;
use rox::error::LoxError;
use rox::scanner::Scanner;
use rox::session::{with_large_stack, Failure, Session};
use rox::token::Token;

/// A `Write` sink the test keeps a handle to after giving it to a session.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session wired to a captured output buffer.
pub fn session() -> (Session, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let session = Session::with_output(Box::new(buffer.clone()));
    (session, buffer)
}

/// Run `source` in a fresh session; return printed output and the outcome.
pub fn run(source: &str) -> (String, Result<(), Failure>) {
    let (mut session, buffer) = session();
    let outcome = session.run(source);
    (buffer.contents(), outcome)
}

/// Like [`run`], on a thread with room for deep recursion.
pub fn run_deep(source: &str) -> (String, Result<(), Failure>) {
    let source = source.to_owned();
    with_large_stack(move || run(&source)).expect("session thread")
}

/// Run `source`, which must succeed, and return its printed lines.
pub fn run_ok(source: &str) -> Vec<String> {
    let (output, outcome) = run(source);
    if let Err(failure) = outcome {
        panic!("program failed:\n{}", failure);
    }
    output.lines().map(str::to_owned).collect()
}

/// Run `source`, which must fail with static errors, and return them rendered.
pub fn static_errors(source: &str) -> Vec<String> {
    match run(source).1 {
        Err(Failure::Static(diagnostics)) => diagnostics.iter().map(|e| e.to_string()).collect(),
        Err(Failure::Runtime(e)) => panic!("expected static errors, got runtime error: {}", e),
        Ok(()) => panic!("expected static errors, program ran"),
    }
}

/// Run `source`, which must fail at runtime; return the error and any output.
pub fn runtime_error(source: &str) -> (LoxError, String) {
    let (output, outcome) = run(source);
    match outcome {
        Err(Failure::Runtime(e)) => (e, output),
        Err(Failure::Static(d)) => panic!("expected runtime error, got static: {:?}", d),
        Ok(()) => panic!("expected runtime error, program ran"),
    }
}

pub fn scan(source: &str) -> (Vec<Token>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let tokens = Scanner::new(source).scan_all(&mut diagnostics);
    (tokens, diagnostics)
}
