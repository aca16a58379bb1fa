//! Stitches the whole system together: a `clap`-derived CLI that reads a
//! source file, runs it through [`vesper::pipeline::run`], and reports
//! diagnostics or the runtime error to stderr with a non-zero exit code.

use std::fs;
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};
use log::info;

use vesper::eval::{is_control_value, Environment, Evaluator, Value};
use vesper::pipeline;

#[derive(ClapParser)]
#[command(name = "vesper", version, about = "The Vesper language core: lex, parse, analyze, evaluate.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Raise logging verbosity (repeat for more: -v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run a source file.
    Run {
        /// Path to the `.vsp` source file.
        #[arg(short, long)]
        file: String,
    },
    /// Show help for a command, or general help if none is given.
    Help {
        command: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run { file } => run_file(&file),
        Command::Help { command } => {
            print_help(command.as_deref());
            ExitCode::SUCCESS
        }
    }
}

fn print_help(command: Option<&str>) {
    match command {
        Some("run") => println!("run -f <path>: execute a Vesper source file"),
        Some(other) => println!("no help available for '{other}'"),
        None => println!("commands: run -f <path>, help [command]"),
    }
}

fn run_file(path: &str) -> ExitCode {
    info!("reading '{path}'");
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(io_error) => {
            eprintln!("could not read '{path}': {io_error}");
            return ExitCode::FAILURE;
        }
    };

    let mut evaluator = Evaluator::new();
    let env = Environment::new();
    match pipeline::run(path, &source, &mut evaluator, &env) {
        Ok(value) => {
            if let Value::Error(runtime_error) = &value {
                eprintln!("{}: {}", runtime_error.level, runtime_error.message);
                return ExitCode::FAILURE;
            }
            if !is_control_value(&value) {
                println!("{value}");
            }
            ExitCode::SUCCESS
        }
        Err(diagnostics) => {
            eprintln!("{}", diagnostics.render_all());
            ExitCode::FAILURE
        }
    }
}
