use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, ValueEnum};
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::diagnostics::Diagnostics;
use rox::parser::Parser;
use rox::scanner::Scanner;
use rox::session::{with_large_stack, Session, EXIT_STATIC_ERROR};
use rox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    /// Script to run; starts an interactive prompt when omitted
    script: Option<PathBuf>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Stop after a front-end phase and print its output instead of running
    #[arg(long, value_enum)]
    emit: Option<Emit>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Emit {
    /// One token per line: KIND lexeme literal
    Tokens,

    /// The token list as JSON
    TokensJson,

    /// Each statement in parenthesised prefix form
    Ast,
}

/// Reads the contents of a file into a String.
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{} {}:{}] - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // RUST_LOG below overrides this
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Print every diagnostic to stderr, one per line.
fn report<'e>(errors: impl IntoIterator<Item = &'e rox::error::LoxError>) {
    for e in errors {
        eprintln!("{}", e);
    }
}

/// `--emit` modes: run only the front end and print what it produced.
fn emit(mode: Emit, source: &str) -> Result<i32> {
    let mut diagnostics = Diagnostics::new();
    let tokens: Vec<Token> = Scanner::new(source).scan_all(&mut diagnostics);

    match mode {
        Emit::Tokens => {
            for token in &tokens {
                println!("{}", token);
            }
        }

        Emit::TokensJson => {
            let json = serde_json::to_string_pretty(&tokens).context("Failed to encode tokens")?;
            println!("{}", json);
        }

        Emit::Ast => {
            let statements = Parser::new(&tokens, &mut diagnostics).parse();
            for stmt in &statements {
                println!("{}", AstPrinter::print_stmt(stmt));
            }
        }
    }

    report(diagnostics.iter());

    Ok(if diagnostics.has_errors() {
        EXIT_STATIC_ERROR
    } else {
        0
    })
}

fn run_file(filename: &PathBuf) -> Result<i32> {
    let source = read_file(filename)?;
    let mut session = Session::new();

    match session.run(&source) {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(0)
        }

        Err(failure) => {
            debug!("Run failed: {}", failure);
            report(failure.errors());
            Ok(failure.exit_code())
        }
    }
}

fn run_prompt() -> Result<()> {
    let mut session = Session::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        if let Err(failure) = session.run(&line) {
            report(failure.errors());
        }
    }

    info!("Prompt closed");
    Ok(())
}

/// Pick the mode from the arguments and return the process exit status.
fn dispatch(args: &Cli) -> Result<i32> {
    match (&args.script, args.emit) {
        (Some(script), Some(mode)) => emit(mode, &read_file(script)?),

        (None, Some(mode)) => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read from stdin")?;
            emit(mode, &source)
        }

        (Some(script), None) => run_file(script),

        (None, None) => {
            run_prompt()?;
            Ok(0)
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    // Deep Lox recursion needs more stack than the main thread has.
    let code: i32 = with_large_stack(move || dispatch(&args))
        .context("Failed to run interpreter thread")??;

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
