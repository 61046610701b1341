//! DroidLink CLI
//!
//! Command-line front end for a DroidLink device.
//!
//! # Commands
//!
//! - `init` - Select the account and assign a device identifier
//! - `record` - Record a missed call or a received SMS
//! - `delete` - Mark an event for deletion on every device
//! - `purge` - Mark events older than the maximum age for deletion
//! - `list` - List local events
//! - `sync` - Run a sync cycle against the server
//! - `register` - Register this device with the server
//! - `status` - Show settings and event counts

mod commands;
mod context;

use clap::{Parser, Subcommand};
use context::{Context, Options};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the account credential.
const CREDENTIAL_ENV: &str = "DROIDLINK_CREDENTIAL";

/// DroidLink device tools.
#[derive(Parser)]
#[command(name = "droidlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the event store and settings
    #[arg(global = true, short, long, default_value = ".droidlink")]
    data_dir: PathBuf,

    /// Server host
    #[arg(global = true, long)]
    host: Option<String>,

    /// Full API base URL, overriding the host
    #[arg(global = true, long)]
    base_url: Option<String>,

    /// Bearer credential of the account (defaults to $DROIDLINK_CREDENTIAL)
    #[arg(global = true, long)]
    credential: Option<String>,

    /// Do not contact the server after local changes
    #[arg(global = true, long)]
    offline: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the account and assign a device identifier
    Init {
        /// Account name
        account: String,

        /// Device name shown to the other devices
        #[arg(short, long)]
        name: Option<String>,

        /// Push registration token
        #[arg(long)]
        push_token: Option<String>,
    },

    /// Record an event on this device
    Record {
        #[command(subcommand)]
        kind: commands::record::RecordKind,
    },

    /// Mark an event for deletion on every device
    Delete {
        /// Event identifier
        id: String,
    },

    /// Mark old events for deletion
    Purge {
        /// Maximum age in days (defaults to 7)
        #[arg(long)]
        max_age_days: Option<u64>,
    },

    /// List local events
    List {
        /// Include events pending deletion
        #[arg(short, long)]
        all: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a sync cycle
    Sync {
        /// Push local changes without downloading
        #[arg(short, long)]
        light: bool,

        /// Sync token received in a push message
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Register this device with the server
    Register {
        /// Register even if already done
        #[arg(short, long)]
        force: bool,
    },

    /// Show settings and event counts
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("DroidLink CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let options = Options {
        data_dir: cli.data_dir,
        host: cli.host,
        base_url: cli.base_url,
        credential: cli.credential.or_else(|| std::env::var(CREDENTIAL_ENV).ok()),
        offline: cli.offline,
    };
    let context = Context::open(options)?;

    match cli.command {
        Commands::Init {
            account,
            name,
            push_token,
        } => commands::init::run(&context, &account, name.as_deref(), push_token.as_deref())?,
        Commands::Record { kind } => commands::record::run(&context, &kind)?,
        Commands::Delete { id } => commands::delete::run(&context, &id)?,
        Commands::Purge { max_age_days } => commands::purge::run(&context, max_age_days)?,
        Commands::List { all, format } => commands::list::run(&context, all, &format)?,
        Commands::Sync { light, token } => commands::sync::run(&context, light, token)?,
        Commands::Register { force } => commands::register::run(&context, force)?,
        Commands::Status { format } => commands::status::run(&context, &format)?,
        Commands::Version => {}
    }

    Ok(())
}
