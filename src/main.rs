//! # OBD CLI
//!
//! Poll and record OBD-II vehicle telemetry from the command line.
//!
//! Commands:
//! - `list`: print supported pids
//! - `poll`: read each given pid once and print the values
//! - `monitor`: poll `PID:INTERVAL` pairs continuously, persisting every
//!   event as a JSON line to stdout or to rotating (optionally gzipped)
//!   files under the output directory, until interrupted with Ctrl+C

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber;

use obd_cli::transport::{self, ConnectionKind, ConnectionOptions, Transport};
use obd_cli::{monitor, pids, poll};

#[derive(Debug, Parser)]
#[command(name = "obd", version, about = "Poll and record OBD-II vehicle telemetry")]
struct Cli {
    /// Type of connection, valid options are "fake" or "serial"
    #[arg(short, long, global = true, value_enum)]
    connection: Option<ConnectionKind>,

    /// Control connection baudrate, e.g 38400
    #[arg(short, long, global = true)]
    baudrate: Option<u32>,

    /// The interface to use for connection, e.g /dev/tty.serialusb
    #[arg(short, long, global = true)]
    interface: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List supported pids that can be passed to "poll" and "monitor"
    List,

    /// Poll for an OBD value(s) specified by one or more pids
    Poll {
        /// Pid codes or names, e.g "2F" or "Fuel Level Input"
        #[arg(required = true)]
        pids: Vec<String>,
    },

    /// Continuously poll pids and record every value
    Monitor {
        /// PID:INTERVAL pairs, e.g 0C:500 to get RPM every 500 milliseconds
        #[arg(required = true)]
        pids: Vec<String>,

        /// Directory to write output files to; omit to print to stdout
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Gzip compress output files
        #[arg(short, long)]
        zip: bool,
    },
}

impl Cli {
    /// Build the transport selected by the global connection flags
    fn transport(&self) -> Result<Arc<dyn Transport>> {
        let kind = self
            .connection
            .context("please specify a valid connection type using option -c")?;

        Ok(transport::create(&ConnectionOptions {
            kind,
            interface: self.interface.clone(),
            baudrate: self.baudrate,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::List => {
            pids::print_supported();
        }

        Command::Poll { pids } => {
            let transport = cli.transport()?;
            poll::run(pids, transport).await?;
        }

        Command::Monitor { pids, outdir, zip } => {
            let transport = cli.transport()?;
            let options = monitor::MonitorOptions {
                outdir: outdir.clone(),
                zip: *zip,
            };
            monitor::run(pids, options, transport).await?;
        }
    }

    Ok(())
}
