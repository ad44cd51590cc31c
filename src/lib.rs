//! Droplet: an experiment recorder for a single lab instrument.
//!
//! Each experiment aggregates timestamped samples; each sample pairs a
//! temperature/humidity reading with an image stored on disk. The crate keeps
//! the SQLite rows and the image files consistent across creation, update,
//! deletion and export.
//!
//! # Architecture
//!
//! - [`core`]: error taxonomy, configuration, logging, the SQLite layer, the
//!   [`core::store::Store`] handle and the JSON-lines RPC session.
//! - [`plugins`]: the subsystems
//!   - `experiment`: experiment CRUD and the explicit two-phase cascade delete
//!   - `data_entry`: sample CRUD and the image file lifecycle
//!   - `selector`: the active experiment slot
//!   - `sensor` / `camera` / `fallback`: collaborator boundaries
//!   - `capture`: serialized selector → sensor → camera → insert pipeline
//!   - `export`: zip bundle of an experiment's images and metadata
//!
//! # Consistency model
//!
//! Row removals for an experiment and its entries commit in one transaction.
//! File operations are outside it: an image may be missing for a live row
//! (every read path tolerates that) and a failed capture insert can leave an
//! orphaned image, which is logged but not cleaned up.
//!
//! # Examples
//!
//! ```bash
//! droplet init
//! droplet experiment add --name "Trial A" --description "desc"
//! droplet capture --experiment 1
//! droplet export --experiment 1 --out Experiment_1.zip
//! droplet serve < requests.jsonl
//! ```

pub mod core;
pub mod plugins;

mod cli;

use crate::cli::{Cli, Command, EntryCommand, ExperimentCommand};
use crate::core::{config, error, logging, rpc, store::Store};
use crate::plugins::{capture, capture::CaptureOrchestrator, data_entry, experiment, export};

use clap::Parser;
use serde::Serialize;
use std::io;
use std::path::PathBuf;

fn print_json<T: Serialize>(value: &T) -> Result<(), error::DropletError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run() -> Result<(), error::DropletError> {
    logging::init();
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let store = Store::from_config(&config)?;
    tracing::debug!(
        root = %store.root.display(),
        images = %store.image_dir.display(),
        "store opened"
    );

    match cli.command {
        Command::Init => print_json(&serde_json::json!({
            "cmd": "init",
            "status": "ok",
            "database": store.db_path().to_string_lossy(),
            "image_dir": store.image_dir.to_string_lossy(),
        })),
        Command::Experiment(experiment_cli) => run_experiment_command(&store, experiment_cli.command),
        Command::Entry(entry_cli) => run_entry_command(&store, entry_cli.command),
        Command::Capture { experiment } => {
            let session = rpc::Session::new(
                store.clone(),
                CaptureOrchestrator::from_config(&config, &store.image_dir),
            );
            session.active().select(experiment)?;
            print_json(&session.capture()?)
        }
        Command::Export { experiment, out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(export::bundle_file_name(experiment)));
            let bundle = export::export_to_file(&store, experiment, &out)?;
            print_json(&serde_json::json!({
                "cmd": "export",
                "path": out.to_string_lossy(),
                "size": bundle.bytes.len(),
                "entry_count": bundle.entry_count,
                "missing_images": bundle.missing_images,
            }))
        }
        Command::Serve => {
            let session = rpc::Session::new(
                store.clone(),
                CaptureOrchestrator::from_config(&config, &store.image_dir),
            );
            tracing::info!("serving JSON-lines requests on stdin");
            rpc::serve(&session, io::stdin().lock(), io::stdout().lock())
        }
        Command::Schema => print_json(&serde_json::json!([
            experiment::schema(),
            data_entry::schema(),
            capture::schema(),
            export::schema(),
        ])),
    }
}

fn run_experiment_command(store: &Store, command: ExperimentCommand) -> Result<(), error::DropletError> {
    match command {
        ExperimentCommand::Add { name, description } => {
            print_json(&experiment::create(store, &name, description.as_deref())?)
        }
        ExperimentCommand::List => print_json(&experiment::list(store)?),
        ExperimentCommand::Get { id } => print_json(&experiment::get(store, id)?),
        ExperimentCommand::Update {
            id,
            name,
            description,
        } => print_json(&experiment::update(store, id, &name, description.as_deref())?),
        ExperimentCommand::Delete { id } => {
            let removed = experiment::delete(store, id)?;
            print_json(&serde_json::json!({
                "cmd": "delete",
                "id": id,
                "entries_removed": removed,
                "status": "ok"
            }))
        }
    }
}

fn run_entry_command(store: &Store, command: EntryCommand) -> Result<(), error::DropletError> {
    match command {
        EntryCommand::Add {
            experiment,
            temperature,
            humidity,
            image,
        } => print_json(&data_entry::create(
            store,
            temperature,
            humidity,
            &image,
            experiment,
        )?),
        EntryCommand::List { experiment } => {
            print_json(&data_entry::list_by_experiment(store, experiment)?)
        }
        EntryCommand::Get { id } => print_json(&data_entry::get(store, id)?),
        EntryCommand::Update {
            experiment,
            id,
            temperature,
            humidity,
            image,
        } => print_json(&data_entry::update(
            store,
            experiment,
            id,
            temperature,
            humidity,
            &image,
        )?),
        EntryCommand::Delete { id } => {
            data_entry::delete(store, id)?;
            print_json(&serde_json::json!({ "cmd": "delete", "id": id, "status": "ok" }))
        }
    }
}
