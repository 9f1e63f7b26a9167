//! Destinations for finished export files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;
use crate::store::write_atomic;

/// A file handed to a [`DownloadSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredFile {
    pub file_name: String,
    pub mime: &'static str,
    pub size: u64,
    /// Where the file landed, for sinks backed by the filesystem.
    pub location: Option<PathBuf>,
}

/// Receives the bytes of an export under the suggested file name.
pub trait DownloadSink {
    fn deliver(&mut self, file_name: &str, mime: &'static str, bytes: &[u8]) -> Result<DeliveredFile, Error>;
}

/// Writes exports into a directory, replacing files of the same name atomically.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, file_name: &str, mime: &'static str, bytes: &[u8]) -> Result<DeliveredFile, Error> {
        let target = self.directory.join(file_name);
        write_atomic(&target, bytes).map_err(|err| Error::Io(target.clone(), err))?;

        debug!(target: "export", path = %target.display(), size = bytes.len(), "wrote export file");
        Ok(DeliveredFile {
            file_name: file_name.to_string(),
            mime,
            size: bytes.len() as u64,
            location: Some(target),
        })
    }
}

/// Keeps delivered files in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    files: Vec<(DeliveredFile, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[(DeliveredFile, Vec<u8>)] {
        &self.files
    }

    pub fn last(&self) -> Option<&(DeliveredFile, Vec<u8>)> {
        self.files.last()
    }
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, file_name: &str, mime: &'static str, bytes: &[u8]) -> Result<DeliveredFile, Error> {
        let file = DeliveredFile {
            file_name: file_name.to_string(),
            mime,
            size: bytes.len() as u64,
            location: None,
        };
        self.files.push((file.clone(), bytes.to_vec()));
        Ok(file)
    }
}
