//! Store handle for droplet's state.
//!
//! A store pairs the SQLite database with the managed image directory. Every
//! `image_filename` recorded in the database is relative to that directory, and
//! all file access by the core goes through [`Store::image_path`].

use crate::core::config::DropletConfig;
use crate::core::db;
use crate::core::error::DropletError;
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Store {
    /// Directory holding `droplet.db`.
    pub root: PathBuf,
    /// Managed image directory.
    pub image_dir: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            image_dir: image_dir.into(),
        }
    }

    /// Create both directories and the schema, then return the handle.
    pub fn open(root: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Result<Self, DropletError> {
        let store = Self::new(root, image_dir);
        db::initialize_droplet_db(&store.root)?;
        fs::create_dir_all(&store.image_dir).map_err(DropletError::IoError)?;
        Ok(store)
    }

    pub fn from_config(config: &DropletConfig) -> Result<Self, DropletError> {
        Self::open(config.data_dir.clone(), config.image_dir())
    }

    pub fn db_path(&self) -> PathBuf {
        db::droplet_db_path(&self.root)
    }

    /// Resolve `filename` inside the image directory.
    ///
    /// Only a single normal path component is accepted.
    pub fn image_path(&self, filename: &str) -> Result<PathBuf, DropletError> {
        validate_image_filename(filename)?;
        Ok(self.image_dir.join(filename))
    }
}

pub fn validate_image_filename(filename: &str) -> Result<(), DropletError> {
    if filename.trim().is_empty() {
        return Err(DropletError::ValidationError(
            "image filename must not be empty".to_string(),
        ));
    }
    let mut components = Path::new(filename).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal || filename.contains('/') || filename.contains('\\') {
        return Err(DropletError::ValidationError(format!(
            "image filename '{}' must be a plain file name inside the image directory",
            filename
        )));
    }
    Ok(())
}
