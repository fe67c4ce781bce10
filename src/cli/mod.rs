//! Command-line interface definitions for the `ecloud` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `ecloud` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ecloud",
    about = "Send signed requests to the Enterprise Cloud API and follow its tasks",
    arg_required_else_help = true
)]
pub enum Cli {
    /// Execute a signed GET and print the XML response.
    #[command(name = "get", about = "Execute a signed GET and print the XML response")]
    Get(GetCommand),
    /// Poll a task until it completes, fails, or times out.
    #[command(name = "wait", about = "Poll a task until it completes, fails, or times out")]
    Wait(WaitCommand),
    /// Decode a composite identifier into its parts.
    #[command(name = "decode-id", about = "Decode a composite identifier into its parts")]
    DecodeId(DecodeIdCommand),
}

/// Arguments for the `ecloud get` subcommand.
#[derive(Debug, Parser)]
pub struct GetCommand {
    /// Resource path, with or without the API prefix or endpoint.
    #[arg(value_name = "PATH")]
    pub path: String,
    /// Query parameter to include in the request and its signature.
    #[arg(long = "query", value_name = "NAME=VALUE", value_parser = parse_query_pair)]
    pub query: Vec<(String, String)>,
}

/// Arguments for the `ecloud wait` subcommand.
#[derive(Debug, Parser)]
pub struct WaitCommand {
    /// Task href returned by a mutating call.
    #[arg(value_name = "TASK_HREF")]
    pub task: String,
    /// Seconds between polls; defaults to the configured poll interval.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
    /// Seconds to wait overall; defaults to the configured task timeout.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the `ecloud decode-id` subcommand.
#[derive(Debug, Parser)]
pub struct DecodeIdCommand {
    /// Identifier kind: `image`, `disk`, `private-ip` or `firewall-rule`.
    #[arg(value_name = "KIND")]
    pub kind: String,
    /// Encoded identifier.
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Splits a `name=value` query argument at the first `=`.
///
/// # Errors
///
/// Returns a message when the argument has no `=` or an empty name.
pub fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}
