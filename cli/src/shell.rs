//! State shared by every subcommand: configuration, translator, preferences, counters.

use std::sync::Arc;

use anyhow::Result;
use shotslice_core::i18n::{LanguageSources, detect_language, params};
use shotslice_core::stats::StatsCollector;
use shotslice_core::store::PrefsStore;
use shotslice_core::{Catalog, Error, ExportFormat, Language, Session, SlicerConfig, Translate, UrlRegistry};
use tracing::warn;

use crate::args::Cli;

#[derive(Debug)]
pub struct Shell {
    pub config: SlicerConfig,
    pub catalog: Catalog,
    pub prefs: Option<PrefsStore>,
    pub stats: Arc<StatsCollector>,
    pub urls: Arc<UrlRegistry>,
}

impl Shell {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = SlicerConfig::discover(cli.config.as_deref())?;

        let prefs = match PrefsStore::default_location() {
            Ok(store) => Some(store),
            Err(err) => {
                warn!("preferences unavailable: {err:#}");
                None
            }
        };
        let persisted = prefs
            .as_ref()
            .and_then(|store| store.load().map_err(|err| warn!("ignoring preferences: {err:#}")).ok())
            .and_then(|prefs| prefs.language)
            .map(|language| language.code().to_string());

        let language = detect_language(&LanguageSources::from_env(cli.lang.clone(), persisted));
        Ok(Self::new(config, Catalog::new(language), prefs))
    }

    pub fn new(config: SlicerConfig, catalog: Catalog, prefs: Option<PrefsStore>) -> Self {
        Self {
            config,
            catalog,
            prefs,
            stats: Arc::new(StatsCollector::new()),
            urls: Arc::new(UrlRegistry::new()),
        }
    }

    pub fn session(&self) -> Session {
        Session::new(self.config.clone(), Arc::clone(&self.urls)).with_stats(Arc::clone(&self.stats))
    }

    /// Slice height from the argument, the last one used, or the configured default.
    pub fn slice_height(&self, requested: Option<u32>) -> u32 {
        requested
            .or_else(|| {
                let prefs = self.prefs.as_ref()?.load().ok()?;
                prefs
                    .last_slice_height
                    .filter(|height| (self.config.min_slice_height..=self.config.max_slice_height).contains(height))
            })
            .unwrap_or(self.config.default_slice_height)
    }

    pub fn remember_slice_height(&self, height: u32) {
        if let Some(store) = &self.prefs {
            if let Err(err) = store.remember_slice_height(height) {
                warn!("could not save slice height: {err:#}");
            }
        }
    }

    pub fn set_language(&mut self, language: Language) {
        self.catalog.set_language(language);
        if let Some(store) = &self.prefs {
            if let Err(err) = store.remember_language(language) {
                warn!("could not save language: {err:#}");
            }
        }
    }

    /// Translate a key with parameters.
    pub fn say<const N: usize>(&self, key: &str, pairs: [(&str, String); N]) -> String {
        self.catalog.t(key, &params(pairs))
    }

    /// "Export as ZIP" / "Export as PDF" in the active language.
    pub fn format_label(&self, format: ExportFormat) -> String {
        self.catalog.text(match format {
            ExportFormat::Zip => "export.zip",
            ExportFormat::Pdf => "export.pdf",
        })
    }

    /// User-facing text for an error: localized when it is a pipeline error.
    pub fn describe(&self, err: &anyhow::Error) -> String {
        match err.downcast_ref::<Error>() {
            Some(err) => err.localized(&self.catalog),
            None => format!("{err:#}"),
        }
    }
}
