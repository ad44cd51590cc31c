//! CLI struct definitions for the droplet command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "droplet",
    version = env!("CARGO_PKG_VERSION"),
    about = "Record experiments as timestamped sensor readings paired with camera images."
)]
pub(crate) struct Cli {
    /// Path to droplet.toml (defaults to ./droplet.toml if present).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the data directory, image directory and database.
    Init,
    /// Manage experiments.
    Experiment(ExperimentCli),
    /// Manage data entries.
    Entry(EntryCli),
    /// Select an experiment and record one capture into it.
    Capture {
        #[clap(long)]
        experiment: i64,
    },
    /// Write an experiment's zip bundle to disk.
    Export {
        #[clap(long)]
        experiment: i64,
        /// Output path (defaults to Experiment_<id>.zip in the current directory).
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Serve JSON-lines requests on stdin/stdout.
    Serve,
    /// Print the command schema of every subsystem.
    Schema,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ExperimentCli {
    #[clap(subcommand)]
    pub command: ExperimentCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ExperimentCommand {
    /// Create an experiment.
    Add {
        #[clap(long)]
        name: String,
        #[clap(long)]
        description: Option<String>,
    },
    /// List all experiments with their entries.
    List,
    /// Show one experiment.
    Get {
        #[clap(long)]
        id: i64,
    },
    /// Replace name and description.
    Update {
        #[clap(long)]
        id: i64,
        #[clap(long)]
        name: String,
        #[clap(long)]
        description: Option<String>,
    },
    /// Delete an experiment, its entries and their images.
    Delete {
        #[clap(long)]
        id: i64,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct EntryCli {
    #[clap(subcommand)]
    pub command: EntryCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum EntryCommand {
    /// Record an entry for an image already in the image directory.
    Add {
        #[clap(long)]
        experiment: i64,
        #[clap(long, allow_negative_numbers = true)]
        temperature: f64,
        #[clap(long)]
        humidity: f64,
        #[clap(long)]
        image: String,
    },
    /// List an experiment's entries.
    List {
        #[clap(long)]
        experiment: i64,
    },
    /// Show one entry.
    Get {
        #[clap(long)]
        id: i64,
    },
    /// Replace temperature, humidity and image filename.
    Update {
        #[clap(long)]
        experiment: i64,
        #[clap(long)]
        id: i64,
        #[clap(long, allow_negative_numbers = true)]
        temperature: f64,
        #[clap(long)]
        humidity: f64,
        #[clap(long)]
        image: String,
    },
    /// Delete an entry and its image.
    Delete {
        #[clap(long)]
        id: i64,
    },
}
