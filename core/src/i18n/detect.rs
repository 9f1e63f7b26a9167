//! Active language resolution.

use tracing::debug;

use super::Language;

/// Environment variable overriding the active language.
pub const LANG_ENV_VAR: &str = "SHOTSLICE_LANG";

const SYSTEM_LOCALE_VARS: [&str; 3] = ["LC_ALL", "LC_MESSAGES", "LANG"];

/// Candidate language tags in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageSources {
    /// Language requested explicitly for this invocation (command-line flag).
    pub explicit: Option<String>,
    /// Value of [`LANG_ENV_VAR`].
    pub environment: Option<String>,
    /// Preference persisted by a previous session.
    pub persisted: Option<String>,
    /// System locale.
    pub system: Option<String>,
}

impl LanguageSources {
    /// Collect the environment-backed sources around the given explicit and persisted values.
    pub fn from_env(explicit: Option<String>, persisted: Option<String>) -> Self {
        let environment = std::env::var(LANG_ENV_VAR).ok();
        let system = SYSTEM_LOCALE_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty() && value != "C" && value != "POSIX");
        Self { explicit, environment, persisted, system }
    }
}

/// Pick the first source naming a supported language, defaulting to English.
pub fn detect_language(sources: &LanguageSources) -> Language {
    let candidates = [
        ("explicit", &sources.explicit),
        ("environment", &sources.environment),
        ("persisted", &sources.persisted),
        ("system", &sources.system),
    ];

    for (origin, tag) in candidates {
        if let Some(language) = tag.as_deref().and_then(Language::from_tag) {
            debug!(target: "i18n", origin, language = %language, "resolved language");
            return language;
        }
    }

    Language::default()
}
