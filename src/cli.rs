// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The directory list ends at the first literal `--`. clap would consume
//! that token as its own end-of-options marker, so the raw argument vector
//! is split there first: everything before goes through clap, everything
//! after is the command, verbatim. Without a `--`, the first positional
//! argument is the only directory and the rest is the command.

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};

/// Token ending the directory list.
pub const SEPARATOR: &str = "--";

/// Command-line options for `within`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "within",
    version,
    about = "Run a command in each of several directories, prefixing output with the directory.",
    override_usage = "within [OPTIONS] <DIRECTORY>... -- <COMMAND>...\n       within [OPTIONS] <DIRECTORY> <COMMAND>...",
    long_about = None
)]
pub struct CliArgs {
    /// Maximum number of jobs to run at the same time.
    ///
    /// Default: `jobs` from the config file, otherwise 1.
    #[arg(short = 'j', long = "jobs", value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<NonZeroUsize>,

    /// Path to a config file (TOML). Takes precedence over `WITHIN_CONFIG`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WITHIN_LOG`, the config file or `warn` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Directories (and, without `--`, the command after the first one).
    #[arg(
        value_name = "DIRECTORY",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub targets: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}

/// A parsed command line with the directory list and command separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub jobs: Option<NonZeroUsize>,
    pub config: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
    pub directories: Vec<String>,
    pub command: Vec<String>,
}

/// Parse `std::env::args_os()`, printing usage and exiting on error.
pub fn parse() -> Invocation {
    match try_parse_from(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(err) => err.exit(),
    }
}

/// Parse an argument vector (including the program name).
pub fn try_parse_from<I, T>(argv: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let (head, tail) = split_at_separator(&argv);

    let args = CliArgs::try_parse_from(head.iter().cloned())?;
    let tail: Option<Vec<String>> = tail
        .map(|t| t.iter().cloned().map(into_utf8).collect())
        .transpose()?;

    resolve_targets(args, tail)
}

/// Split at the first `--` after the program name.
fn split_at_separator(argv: &[OsString]) -> (&[OsString], Option<&[OsString]>) {
    match argv
        .iter()
        .skip(1)
        .position(|arg| arg.as_os_str() == SEPARATOR)
    {
        Some(i) => (&argv[..=i], Some(&argv[i + 2..])),
        None => (argv, None),
    }
}

fn resolve_targets(
    args: CliArgs,
    command_tail: Option<Vec<String>>,
) -> Result<Invocation, clap::Error> {
    let CliArgs {
        jobs,
        config,
        log_level,
        mut targets,
    } = args;

    let (directories, command) = match command_tail {
        Some(command) => {
            if targets.is_empty() {
                return Err(usage_error("no directories given before `--`"));
            }
            if command.is_empty() {
                return Err(usage_error("no command given after `--`"));
            }
            (targets, command)
        }
        None => {
            if targets.len() < 2 {
                return Err(usage_error("expected a directory and a command"));
            }
            let command = targets.split_off(1);
            (targets, command)
        }
    };

    Ok(Invocation {
        jobs,
        config,
        log_level,
        directories,
        command,
    })
}

fn usage_error(message: &str) -> clap::Error {
    CliArgs::command().error(ErrorKind::MissingRequiredArgument, message)
}

fn into_utf8(arg: OsString) -> Result<String, clap::Error> {
    arg.into_string().map_err(|raw| {
        CliArgs::command().error(
            ErrorKind::InvalidUtf8,
            format!("argument is not valid UTF-8: {raw:?}"),
        )
    })
}

fn parse_jobs(s: &str) -> Result<NonZeroUsize, String> {
    s.trim()
        .parse::<usize>()
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| format!("invalid -j: {s} (expected a positive integer)"))
}
