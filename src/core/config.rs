//! Runtime configuration loaded from `droplet.toml`.
//!
//! A missing file is not an error: every field has a default suited to a
//! single instrument rig. Environment variables are applied on top of the file.

use crate::core::error::DropletError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "droplet.toml";

pub const ENV_DATA_DIR: &str = "DROPLET_DATA_DIR";
pub const ENV_IMAGE_DIR: &str = "DROPLET_IMAGE_DIR";
pub const ENV_MOCK_MODE: &str = "DROPLET_MOCK_MODE";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DropletConfig {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/images` when unset.
    pub image_dir: Option<PathBuf>,
    pub capture_prefix: String,
    /// Fall back to mock collaborators when the sensor or camera fails.
    pub mock_mode: bool,
    pub camera: CameraConfig,
    pub sensor: SensorConfig,
    pub mock: MockConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Run once before the first read (e.g. to start periodic measurement).
    pub init_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockConfig {
    /// Image inside the image directory copied for every mock capture.
    pub template_image: String,
    pub temperature: f64,
    pub humidity: f64,
}

impl Default for DropletConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".droplet"),
            image_dir: None,
            capture_prefix: "droplet".to_string(),
            mock_mode: false,
            camera: CameraConfig::default(),
            sensor: SensorConfig::default(),
            mock: MockConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            program: "gphoto2".to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            program: "i2ctransfer".to_string(),
            args: ["-y", "1", "w2@0x45", "0xe0", "0x00", "r6@0x45"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            init_args: Some(
                ["-y", "1", "w2@0x45", "0x23", "0x34"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            template_image: "droplet_20240404T133433.jpg".to_string(),
            temperature: 25.0,
            humidity: 50.0,
        }
    }
}

impl DropletConfig {
    pub fn image_dir(&self) -> PathBuf {
        self.image_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("images"))
    }

    pub fn validate(&self) -> Result<(), DropletError> {
        let prefix_re = Regex::new(r"^[A-Za-z0-9_-]+$")
            .map_err(|e| DropletError::ConfigError(e.to_string()))?;
        if !prefix_re.is_match(&self.capture_prefix) {
            return Err(DropletError::ConfigError(format!(
                "Invalid capture_prefix '{}': must be non-empty and match [A-Za-z0-9_-]",
                self.capture_prefix
            )));
        }
        if self.camera.program.trim().is_empty() {
            return Err(DropletError::ConfigError(
                "camera.program must not be empty".to_string(),
            ));
        }
        if self.sensor.program.trim().is_empty() {
            return Err(DropletError::ConfigError(
                "sensor.program must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var(ENV_DATA_DIR)
            && !dir.trim().is_empty()
        {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var(ENV_IMAGE_DIR)
            && !dir.trim().is_empty()
        {
            self.image_dir = Some(PathBuf::from(dir));
        }
        if let Ok(flag) = env::var(ENV_MOCK_MODE) {
            self.mock_mode = parse_flag(&flag);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn parse_config(content: &str) -> Result<DropletConfig, DropletError> {
    toml::from_str(content).map_err(|e| DropletError::ConfigError(e.to_string()))
}

/// Load configuration from `path`, or from `./droplet.toml` when no path is given.
///
/// An explicit path must exist; the implicit one may be absent.
pub fn load_config(path: Option<&Path>) -> Result<DropletConfig, DropletError> {
    let mut config = match path {
        Some(p) => {
            let content = fs::read_to_string(p).map_err(|e| {
                DropletError::ConfigError(format!("cannot read {}: {}", p.display(), e))
            })?;
            parse_config(&content)?
        }
        None => {
            let default_path = Path::new(CONFIG_FILE_NAME);
            if default_path.exists() {
                let content = fs::read_to_string(default_path).map_err(DropletError::IoError)?;
                parse_config(&content)?
            } else {
                DropletConfig::default()
            }
        }
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}
