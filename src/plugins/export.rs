//! Experiment export as a zip bundle.
//!
//! Layout:
//! ```text
//! manifest.json
//! entry_<id>/image/<image_filename>   (only if the image is on disk)
//! entry_<id>/metadata.txt
//! ```
//! Images sit one level below the record, so no stored filename can shadow
//! `metadata.txt`. A missing image drops only that file; the entry's metadata
//! is still written and the export succeeds.

use crate::core::error::DropletError;
use crate::core::store::Store;
use crate::plugins::data_entry::{self, DataEntry};
use crate::plugins::experiment;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const MANIFEST_NAME: &str = "manifest.json";
pub const METADATA_NAME: &str = "metadata.txt";
pub const IMAGE_DIR_NAME: &str = "image";

#[derive(Debug, Clone)]
pub struct ExportBundle {
    /// Suggested download name, `Experiment_<id>.zip`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub entry_count: usize,
    /// Ids of entries whose image was not found on disk.
    pub missing_images: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportManifest {
    pub experiment_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub exported_at: String,
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManifestEntry {
    pub id: i64,
    pub image_filename: String,
    pub image_included: bool,
    pub image_sha256: Option<String>,
}

pub fn compartment_name(entry_id: i64) -> String {
    format!("entry_{}", entry_id)
}

pub fn image_member_name(entry_id: i64, image_filename: &str) -> String {
    format!("{}/{}/{}", compartment_name(entry_id), IMAGE_DIR_NAME, image_filename)
}

pub fn metadata_member_name(entry_id: i64) -> String {
    format!("{}/{}", compartment_name(entry_id), METADATA_NAME)
}

pub fn bundle_file_name(experiment_id: i64) -> String {
    format!("Experiment_{}.zip", experiment_id)
}

pub fn render_metadata(entry: &DataEntry) -> String {
    format!(
        "Timestamp: {}\nTemperature: {:?}\nHumidity: {:?}\n",
        entry.timestamp, entry.temperature, entry.humidity
    )
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Build the whole bundle in memory.
pub fn export_experiment(store: &Store, experiment_id: i64) -> Result<ExportBundle, DropletError> {
    let experiment = experiment::get(store, experiment_id)?;
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let mut manifest_entries = Vec::with_capacity(experiment.data_entries.len());
    let mut missing_images = Vec::new();

    for entry in &experiment.data_entries {
        let image = match data_entry::load_image(store, &entry.image_filename) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(entry_id = entry.id, error = %e, "image unreadable, exporting metadata only");
                None
            }
        };

        let image_sha256 = match &image {
            Some(bytes) => {
                zip.start_file(image_member_name(entry.id, &entry.image_filename), options)?;
                zip.write_all(bytes)?;
                Some(hash_bytes(bytes))
            }
            None => {
                tracing::debug!(entry_id = entry.id, image = %entry.image_filename, "image missing from export");
                missing_images.push(entry.id);
                None
            }
        };

        zip.start_file(metadata_member_name(entry.id), options)?;
        zip.write_all(render_metadata(entry).as_bytes())?;

        manifest_entries.push(ManifestEntry {
            id: entry.id,
            image_filename: entry.image_filename.clone(),
            image_included: image_sha256.is_some(),
            image_sha256,
        });
    }

    let manifest = ExportManifest {
        experiment_id,
        name: experiment.name.clone(),
        description: experiment.description.clone(),
        exported_at: crate::core::time::now_rfc3339(),
        entries: manifest_entries,
    };
    zip.start_file(MANIFEST_NAME, options)?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    let bytes = zip.finish()?.into_inner();
    tracing::info!(
        experiment_id,
        entries = experiment.data_entries.len(),
        missing = missing_images.len(),
        size = bytes.len(),
        "experiment exported"
    );

    Ok(ExportBundle {
        file_name: bundle_file_name(experiment_id),
        bytes,
        entry_count: experiment.data_entries.len(),
        missing_images,
    })
}

/// Export and write the bundle to `out`.
pub fn export_to_file(store: &Store, experiment_id: i64, out: &Path) -> Result<ExportBundle, DropletError> {
    let bundle = export_experiment(store, experiment_id)?;
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(DropletError::IoError)?;
    }
    fs::write(out, &bundle.bytes).map_err(DropletError::IoError)?;
    Ok(bundle)
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "export",
        "version": "0.1.0",
        "description": "Zip bundle of an experiment's images and metadata",
        "commands": [
            { "name": "export", "parameters": ["experiment", "out"] }
        ],
        "storage": []
    })
}
