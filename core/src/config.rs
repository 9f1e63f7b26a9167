//! Runtime configuration for the slicer.
//!
//! Every field has a default so a missing or partial `shotslice.json` is valid. Unknown fields are
//! rejected to surface typos early.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::preview::ImageClick;
use crate::types::{Rgb, SliceEncoding};

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORGANISATION: &str = "Shotslice";
pub const APP_NAME: &str = "shotslice";

pub const CONFIG_FILE_NAME: &str = "shotslice.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlicerConfig {
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
    /// Slice height used when the user does not enter one.
    pub default_slice_height: u32,
    /// Smallest accepted slice height.
    pub min_slice_height: u32,
    /// Largest accepted slice height.
    pub max_slice_height: u32,
    /// Format and quality each slice is encoded with.
    pub encoding: SliceEncoding,
    /// Color transparent pixels are flattened onto for JPEG output.
    pub background: Rgb,
    /// File name (without extension) used when the user leaves the name blank.
    pub default_output_name: String,
    /// What clicking a slice image does in the preview grid.
    pub image_click: ImageClick,
    /// Longest edge of preview thumbnails, in pixels.
    pub thumbnail_edge: u32,
}

impl SlicerConfig {
    pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

    /// Resolve the platform configuration file location.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "config", path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(Error::Io(path.to_path_buf(), err)),
        };

        let config: Self = serde_json::from_slice(&bytes)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        debug!(target: "config", path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load from `path` if given, otherwise from the platform default location.
    pub fn discover(path: Option<&Path>) -> Result<Self, Error> {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".into()));
        }
        if self.min_slice_height == 0 || self.min_slice_height > self.max_slice_height {
            return Err(Error::Config(format!(
                "slice height range {}..={} is empty",
                self.min_slice_height, self.max_slice_height
            )));
        }
        if !(self.min_slice_height..=self.max_slice_height).contains(&self.default_slice_height) {
            return Err(Error::Config(format!(
                "default_slice_height {} is outside {}..={}",
                self.default_slice_height, self.min_slice_height, self.max_slice_height
            )));
        }
        if let SliceEncoding::Jpeg { quality } = self.encoding {
            if !(1..=100).contains(&quality) {
                return Err(Error::Config(format!("jpeg quality {quality} is outside 1..=100")));
            }
        }
        if self.thumbnail_edge == 0 {
            return Err(Error::Config("thumbnail_edge must be positive".into()));
        }
        Ok(())
    }
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: Self::DEFAULT_MAX_UPLOAD_BYTES,
            default_slice_height: 1000,
            min_slice_height: 100,
            max_slice_height: 5000,
            encoding: SliceEncoding::default(),
            background: Rgb::default(),
            default_output_name: "slices".to_string(),
            image_click: ImageClick::default(),
            thumbnail_edge: 240,
        }
    }
}
