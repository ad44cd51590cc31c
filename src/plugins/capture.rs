//! Capture orchestration: one sensor reading plus one image becomes one data
//! entry under the active experiment.

use crate::core::config::DropletConfig;
use crate::core::error::DropletError;
use crate::core::store::Store;
use crate::plugins::camera::{GphotoCamera, ImageAcquirer, TemplateCamera};
use crate::plugins::data_entry::{self, DataEntry};
use crate::plugins::fallback::Fallback;
use crate::plugins::selector::{ActiveExperiment, Selection};
use crate::plugins::sensor::{CommandSensor, FixedSensor, SensorReader};
use std::path::Path;

pub struct CaptureOrchestrator {
    sensor: Box<dyn SensorReader>,
    camera: Box<dyn ImageAcquirer>,
    name_prefix: String,
}

impl CaptureOrchestrator {
    pub fn new(
        sensor: Box<dyn SensorReader>,
        camera: Box<dyn ImageAcquirer>,
        name_prefix: impl Into<String>,
    ) -> Self {
        Self {
            sensor,
            camera,
            name_prefix: name_prefix.into(),
        }
    }

    /// Wire the hardware collaborators, wrapped in mock fallbacks when
    /// `mock_mode` is set.
    pub fn from_config(config: &DropletConfig, image_dir: &Path) -> Self {
        let command_sensor = CommandSensor::from_config(&config.sensor);
        let gphoto = GphotoCamera::from_config(&config.camera, image_dir);

        let (sensor, camera): (Box<dyn SensorReader>, Box<dyn ImageAcquirer>) = if config.mock_mode {
            tracing::info!("mock mode enabled for sensor and camera");
            (
                Box::new(Fallback::new(command_sensor, FixedSensor::from_config(&config.mock))),
                Box::new(Fallback::new(
                    gphoto,
                    TemplateCamera::from_config(&config.mock, image_dir),
                )),
            )
        } else {
            (Box::new(command_sensor), Box::new(gphoto))
        };

        Self::new(sensor, camera, config.capture_prefix.clone())
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Run one capture against the active experiment.
    ///
    /// The selector's lock is held from the first step to the last, so
    /// captures sharing a selector run one at a time and the selection cannot
    /// change underneath them. If the insert fails after the image was
    /// written, the file is left in place and reported as an orphan.
    pub fn capture(&self, store: &Store, active: &ActiveExperiment) -> Result<DataEntry, DropletError> {
        let slot = active.hold()?;
        let experiment_id = match *slot {
            Selection::Unset => {
                return Err(DropletError::PreconditionFailed(
                    "no active experiment selected".to_string(),
                ));
            }
            Selection::Selected(id) => id,
        };

        let reading = self.sensor.read()?;
        let image_filename = self.camera.acquire(&self.name_prefix)?;
        tracing::debug!(
            experiment_id,
            temperature = reading.temperature,
            humidity = reading.humidity,
            image = %image_filename,
            "capture acquired"
        );

        data_entry::create(
            store,
            reading.temperature,
            reading.humidity,
            &image_filename,
            experiment_id,
        )
        .map_err(|e| {
            tracing::warn!(
                experiment_id,
                image = %image_filename,
                error = %e,
                "capture insert failed; image left on disk without a data entry"
            );
            e
        })
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "capture",
        "version": "0.1.0",
        "description": "Record a sensor reading and an image under the active experiment",
        "commands": [
            { "name": "capture", "parameters": ["experiment"] }
        ],
        "storage": ["droplet.db", "images/"]
    })
}
