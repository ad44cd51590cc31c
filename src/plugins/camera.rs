//! Image acquisition collaborators.
//!
//! Acquirers place a file directly in the managed image directory and return
//! its name. Names follow `<prefix>_<YYYYmmddTHHMMSS>.jpg` in local time, so
//! two captures with one prefix inside the same second produce the same name.

use crate::core::config::{CameraConfig, MockConfig};
use crate::core::error::DropletError;
use crate::core::time;
use chrono::Local;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

pub const IMAGE_EXTENSION: &str = "jpg";

pub trait ImageAcquirer: Send + Sync {
    /// Acquire one image named after `name_prefix` and return its file name.
    fn acquire(&self, name_prefix: &str) -> Result<String, DropletError>;
}

pub fn capture_filename(name_prefix: &str) -> String {
    format!(
        "{}_{}.{}",
        name_prefix,
        time::capture_stamp(Local::now()),
        IMAGE_EXTENSION
    )
}

/// Drives a tethered camera through the gphoto2 CLI.
#[derive(Debug, Clone)]
pub struct GphotoCamera {
    program: String,
    args: Vec<String>,
    image_dir: PathBuf,
}

impl GphotoCamera {
    pub fn from_config(config: &CameraConfig, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            image_dir: image_dir.into(),
        }
    }
}

impl ImageAcquirer for GphotoCamera {
    fn acquire(&self, name_prefix: &str) -> Result<String, DropletError> {
        let filename = capture_filename(name_prefix);
        let target = self.image_dir.join(&filename);

        tracing::debug!(program = %self.program, target = %target.display(), "capturing image");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--capture-image-and-download")
            .arg("--filename")
            .arg(&target)
            .output()
            .map_err(|e| DropletError::CameraError(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(DropletError::CameraError(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !target.is_file() {
            return Err(DropletError::CameraError(format!(
                "{} reported success but {} was not written",
                self.program,
                target.display()
            )));
        }
        Ok(filename)
    }
}

/// Copies a template image under a fresh capture name.
#[derive(Debug, Clone)]
pub struct TemplateCamera {
    image_dir: PathBuf,
    template: String,
}

impl TemplateCamera {
    pub fn new(image_dir: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            image_dir: image_dir.into(),
            template: template.into(),
        }
    }

    pub fn from_config(mock: &MockConfig, image_dir: impl Into<PathBuf>) -> Self {
        Self::new(image_dir, mock.template_image.clone())
    }
}

impl ImageAcquirer for TemplateCamera {
    fn acquire(&self, name_prefix: &str) -> Result<String, DropletError> {
        let source = self.image_dir.join(&self.template);
        let filename = capture_filename(name_prefix);
        fs::copy(&source, self.image_dir.join(&filename)).map_err(|e| {
            DropletError::CameraError(format!(
                "cannot copy template image {}: {}",
                source.display(),
                e
            ))
        })?;
        Ok(filename)
    }
}
