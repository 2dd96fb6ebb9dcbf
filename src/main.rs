use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use serde_json::json;

use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver;
use rox::session::{self, Outcome, Session};
use rox::sink::StderrDiagnostics;

#[derive(ClapParser, Debug)]
#[command(version, about = "Rox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize { filename: PathBuf },

    /// Parses and resolves a file, printing the scope distance of every local reference
    Resolve {
        filename: PathBuf,

        /// Emit the table and errors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Runs input from a file as a Rox program
    Run { filename: PathBuf },
}

/// Reads the contents of a file into a String
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module and source line
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(source: &str) -> Outcome {
    let (tokens, errors) = session::scan(source);

    for token in &tokens {
        println!("{}", token);
    }

    for e in &errors {
        eprintln!("{}", e);
    }

    if errors.is_empty() {
        Outcome::Success
    } else {
        Outcome::CompileError
    }
}

fn resolve(source: &str, as_json: bool) -> Result<Outcome> {
    let (tokens, mut errors) = session::scan(source);

    let statements = match Parser::new(tokens).parse() {
        Ok(statements) => statements,
        Err(parse_errors) => {
            errors.extend(parse_errors);
            Vec::new()
        }
    };

    let resolution = resolver::resolve(&statements);
    errors.extend(resolution.errors);

    if as_json {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        let report = json!({ "locals": resolution.table, "errors": messages });

        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to encode resolution")?
        );
    } else {
        for (id, distance) in resolution.table.iter() {
            println!("{} {}", id, distance);
        }

        for e in &errors {
            eprintln!("{}", e);
        }
    }

    Ok(if errors.is_empty() {
        Outcome::Success
    } else {
        Outcome::CompileError
    })
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let outcome = match args.commands {
        Commands::Tokenize { filename } => {
            info!("Running Tokenize subcommand");
            tokenize(&read_file(filename)?)
        }

        Commands::Resolve { filename, json } => {
            info!("Running Resolve subcommand");
            resolve(&read_file(filename)?, json)?
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");
            let source = read_file(filename)?;
            let mut session = Session::new(Interpreter::new(), StderrDiagnostics);

            session.run(&source)
        }
    };

    debug!("Outcome: {:?}", outcome);

    if outcome != Outcome::Success {
        std::process::exit(outcome.exit_code());
    }

    Ok(())
}
