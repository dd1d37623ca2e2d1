//! `rox`: a tree‑walking interpreter for the Lox scripting language.
//!
//! Pipeline: [`scanner`] → [`parser`] → [`resolver`] → [`interpreter`], driven
//! end to end by [`session::Session`].

pub mod ast;
pub mod ast_printer;
pub mod class;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod token;
pub mod value;
