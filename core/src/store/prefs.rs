//! User preferences remembered between runs: interface language and last slice height.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{APP_NAME, APP_ORGANISATION, APP_QUALIFIER};
use crate::i18n::Language;

use super::{Result, write_atomic};

const PREFS_FILE_NAME: &str = "prefs.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    pub language: Option<Language>,
    pub last_slice_height: Option<u32>,
    pub updated_ms: u64,
}

/// JSON-backed preference file. Writes go through a temp file and a rename.
#[derive(Debug)]
pub struct PrefsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PrefsStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Store in the per-user application data directory.
    pub fn default_location() -> Result<Self> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME)
            .ok_or_else(|| anyhow!("unable to resolve application data directory"))?;
        Ok(Self::at(dirs.data_dir().join("state").join(PREFS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored preferences; a missing file yields defaults.
    pub fn load(&self) -> Result<Prefs> {
        let _guard = self.lock.lock();
        self.read()
    }

    pub fn save(&self, prefs: &Prefs) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(prefs)
    }

    pub fn remember_language(&self, language: Language) -> Result<()> {
        self.update(|prefs| prefs.language = Some(language))
    }

    pub fn remember_slice_height(&self, height: u32) -> Result<()> {
        self.update(|prefs| prefs.last_slice_height = Some(height))
    }

    fn update(&self, apply: impl FnOnce(&mut Prefs)) -> Result<()> {
        let _guard = self.lock.lock();
        let mut prefs = self.read()?;
        apply(&mut prefs);
        prefs.updated_ms = now_ms();
        self.write(&prefs)
    }

    fn read(&self) -> Result<Prefs> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing preferences at {}", self.path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Prefs::default()),
            Err(err) => Err(err).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    fn write(&self, prefs: &Prefs) -> Result<()> {
        let data = serde_json::to_vec_pretty(prefs)?;
        write_atomic(&self.path, &data).with_context(|| format!("writing {}", self.path.display()))?;

        debug!(target: "store", path = %self.path.display(), "saved preferences");
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PrefsStore::at(dir.path().join("nested").join(PREFS_FILE_NAME));
        assert_eq!(store.load().unwrap(), Prefs::default());
    }

    #[test]
    fn remembers_language_and_height_independently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PrefsStore::at(dir.path().join(PREFS_FILE_NAME));

        store.remember_language(Language::Zh).unwrap();
        store.remember_slice_height(1200).unwrap();

        let prefs = store.load().unwrap();
        assert_eq!(prefs.language, Some(Language::Zh));
        assert_eq!(prefs.last_slice_height, Some(1200));
        assert!(prefs.updated_ms > 0);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(PREFS_FILE_NAME);
        fs::write(&path, b"{not json").unwrap();
        assert!(PrefsStore::at(path).load().is_err());
    }
}
