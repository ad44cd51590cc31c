//! Droplet subsystems.

pub mod camera;
pub mod capture;
pub mod data_entry;
pub mod experiment;
pub mod export;
pub mod fallback;
pub mod selector;
pub mod sensor;
