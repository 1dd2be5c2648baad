use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sdb_utils::{LogFormat, LogLevel, LoggingError, LoggingGuard};

#[cfg(target_os = "linux")]
mod session;

/// A ptrace-based native debugger.
#[derive(Parser, Debug)]
#[command(name = "sdb")]
#[command(version)]
#[command(about = "A ptrace-based native debugger", long_about = None)]
struct Cli
{
    /// Attach to a running process by PID instead of launching one
    #[arg(short, long, conflicts_with = "program")]
    pid: Option<u32>,

    /// Program to launch under the debugger (looked up on PATH)
    #[arg(required_unless_present = "pid")]
    program: Option<String>,

    /// Arguments to pass to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, requires = "program")]
    args: Vec<String>,

    /// Log level (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides SDB_LOG_FORMAT)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Write logs to this file instead of stderr (a directory gets a dated file)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> Result<LoggingGuard, LoggingError>
{
    if let Some(path) = &cli.log_file {
        return sdb_utils::init_logging_to_file(path, cli.log_level, cli.log_format.unwrap_or_default());
    }

    match (cli.log_level, cli.log_format) {
        (Some(level), format) => sdb_utils::init_logging_with_level(level, format.unwrap_or_default()),
        (None, Some(format)) => sdb_utils::init_logging_with_format(format),
        (None, None) => sdb_utils::init_logging(),
    }
}

#[cfg(target_os = "linux")]
fn main() -> ExitCode
{
    use std::io;

    use sdb_core::{Process, ProcessId};
    use sdb_utils::{debug, info};

    let cli = Cli::parse();

    let _logging = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Without a process there is nothing for the session to operate on
    let created = match cli.pid {
        Some(pid) => Process::attach(ProcessId::from(pid)).map(|p| (p, "Attached to")),
        None => {
            let program = cli.program.as_deref().unwrap_or_default();
            let args: Vec<&str> = cli.args.iter().map(String::as_str).collect();
            Process::launch_with_args(program, &args).map(|p| (p, "Launched"))
        }
    };

    let mut process = match created {
        Ok((process, verb)) => {
            println!("{verb} process {}", process.pid());
            process
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(pid = %process.pid(), "Session started");
    let result = session::run(&mut process, io::stdin().lock(), io::stdout().lock());

    let report = process.close();
    debug!(?report, "Session ended");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn main() -> ExitCode
{
    let cli = Cli::parse();
    let _logging = init_logging(&cli);
    eprintln!("sdb only supports Linux: it drives targets through ptrace(2).");
    ExitCode::FAILURE
}
