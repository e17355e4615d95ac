mod client;
mod config;
mod output;
mod report;
mod session;

use crate::client::DynClient;
use crate::output::{TimestampStyle, present};
use crate::report::{DEFAULT_LIMIT, QueryParameters, fetch_zone_report};
use crate::session::Session;
use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use std::io;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(
    name = "znr",
    version,
    about = "Print the notes and nodes of a DynECT zone",
    long_about = "Logs into the DynECT REST API with the credentials from credentials.yaml, \
prints the zone note report and node list for one zone, optionally writes the newest \
note to a file, and logs out."
)]
struct Cli {
    #[arg(
        short = 'z',
        long = "zone_name",
        value_name = "ZONE_NAME",
        help = "Search for zone report with zone name"
    )]
    zone_name: String,

    #[arg(
        short,
        long,
        default_value_t = DEFAULT_LIMIT,
        help = "The maximum number of notes to be retrieved"
    )]
    limit: u32,

    #[arg(short, long, value_name = "FILE", help = "File to output to")]
    file: Option<PathBuf>,

    #[arg(long, help = "Render epoch timestamps as dates (UTC)")]
    format_time: bool,

    #[arg(
        long,
        value_name = "URL",
        help = "Base URL for the API (defaults to https://api2.dynect.net)"
    )]
    base_url: Option<String>,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v, -vv, -vvv)")]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let cwd = std::env::current_dir().context("reading current directory")?;
    let effective = config::resolve(&cwd, cli.base_url.clone())?;
    debug!(base_url = %effective.base_url, credentials = ?effective.credentials, "resolved config");

    let mut client = DynClient::new(&effective.base_url, effective.client)?;
    let session = Session::login(&mut client, &effective.credentials)?;
    println!("Logged In");

    let query = QueryParameters {
        zone: cli.zone_name,
        limit: cli.limit,
    };
    let report = fetch_zone_report(&session, &query)?;

    let style = if cli.format_time {
        TimestampStyle::Formatted
    } else {
        TimestampStyle::Raw
    };
    present(&report, cli.file.as_deref(), style, &mut io::stdout().lock())?;

    session.logout();
    Ok(())
}

// RUST_LOG takes precedence over -v.
fn init_logging(verbosity: u8) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("initialising logging: {e}"))
}
