//! ftpsync: push and version artifacts on an FTP server
//!
//! Reads a JSON request on stdin and writes a single JSON result on stdout.
//! Everything else (logs, progress) goes to stderr.
//!
//! - `check`: current version of the tracked file, `[]` if it does not exist
//! - `in <dir>`: download the tracked file into `<dir>`
//! - `out <dir>`: upload the tracked file, or sync a directory tree
//!
//! Installed as `check`, `in` and `out` (e.g. symlinks), the program name
//! picks the verb.

mod commands;
mod progress;
mod request;

use std::ffi::OsString;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand, builder::Styles};
use color_eyre::Result;
use color_eyre::eyre::WrapErr as _;
use serde::Serialize;

use ftpsync_transport::FtpConnector;

use crate::progress::SyncProgress;
use crate::request::Request;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

/// Verbs the program can be invoked as
const VERBS: [&str; 3] = ["check", "in", "out"];

#[derive(Parser)]
#[command(name = "ftpsync")]
#[command(version)]
#[command(styles = STYLES)]
#[command(about = "Version and sync artifacts on an FTP server")]
#[command(long_about = r#"
ftpsync reads a JSON request on stdin and prints one JSON result on stdout.

Request:
  {
    "source": { "address": "host[:port]", "username": "...", "password": "...",
                "filename": "/path/of/tracked/file", "tls": false },
    "params": { "path": "local/file" }            tracked file
         or   { "local": "dir", "remote": "/dir" } directory sync
  }

Examples:
  ftpsync check < request.json
  ftpsync in ./inputs < request.json
  ftpsync out ./outputs < request.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current version of the tracked file
    Check,

    /// Download the tracked file
    In {
        /// Directory to download into
        base: PathBuf,
    },

    /// Upload the tracked file or sync a directory tree
    Out {
        /// Directory holding the files to push
        base: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse_from(resource_args(std::env::args_os()));

    // Setup logging; stdout is reserved for the result
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let request = Request::from_reader(io::stdin().lock()).wrap_err("error reading request")?;
    let connector = FtpConnector::new();

    match cli.command {
        Commands::Check => {
            let refs = commands::check(&connector, &request).wrap_err("check failed")?;
            emit(&refs)
        }
        Commands::In { base } => {
            let output = commands::fetch(&connector, &request, &base).wrap_err("in failed")?;
            emit(&output)
        }
        Commands::Out { base } => {
            let mut progress = SyncProgress::new();
            let output =
                commands::push(&connector, &request, &base, &mut progress).wrap_err("out failed")?;
            emit(&output)
        }
    }
}

/// Map `/opt/resource/check args..` to `ftpsync check args..`
fn resource_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().collect();

    let invoked_as = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| VERBS.contains(name))
        .map(str::to_owned);

    if let Some(verb) = invoked_as {
        args[0] = OsString::from(verb);
        args.insert(0, OsString::from("ftpsync"));
    }
    args
}

/// Write the result as one line of JSON on stdout
fn emit<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_resource_args_from_program_name() {
        assert_eq!(
            resource_args(args(&["/opt/resource/in", "/tmp/build/get"])),
            args(&["ftpsync", "in", "/tmp/build/get"])
        );
        assert_eq!(
            resource_args(args(&["/opt/resource/check"])),
            args(&["ftpsync", "check"])
        );
    }

    #[test]
    fn test_resource_args_passthrough() {
        assert_eq!(
            resource_args(args(&["ftpsync", "-v", "out", "dir"])),
            args(&["ftpsync", "-v", "out", "dir"])
        );
    }

    #[test]
    fn test_cli_parses_verbs() {
        let cli = Cli::parse_from(resource_args(args(&["/opt/resource/out", "src"])));
        assert!(matches!(cli.command, Commands::Out { ref base } if base == Path::new("src")));

        let cli = Cli::parse_from(args(&["ftpsync", "--verbose", "check"]));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Check));
    }
}
