//! Mock mode at the collaborator boundary.
//!
//! When `mock_mode` is on, a failing sensor or camera is replaced by a mock
//! for that call instead of aborting the capture. Without it, collaborator
//! errors stay fatal.

use crate::core::error::DropletError;
use crate::plugins::camera::ImageAcquirer;
use crate::plugins::sensor::{SensorReader, SensorReading};

#[derive(Debug)]
pub struct Fallback<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> Fallback<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: SensorReader, F: SensorReader> SensorReader for Fallback<P, F> {
    fn read(&self) -> Result<SensorReading, DropletError> {
        self.primary.read().or_else(|e| {
            tracing::warn!(error = %e, "sensor read failed, using mock reading");
            self.fallback.read()
        })
    }
}

impl<P: ImageAcquirer, F: ImageAcquirer> ImageAcquirer for Fallback<P, F> {
    fn acquire(&self, name_prefix: &str) -> Result<String, DropletError> {
        self.primary.acquire(name_prefix).or_else(|e| {
            tracing::warn!(error = %e, "image acquisition failed, using mock image");
            self.fallback.acquire(name_prefix)
        })
    }
}
