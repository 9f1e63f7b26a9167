//! User-facing string lookup.
//!
//! The pipeline never formats messages itself; it calls [`Translate::t`] with a catalog key and
//! a parameter map. Catalogs are embedded JSON dictionaries, one per supported language.

pub mod detect;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use detect::{LANG_ENV_VAR, LanguageSources, detect_language};

/// Parameters substituted into `{name}` placeholders.
pub type Params<'a> = HashMap<&'a str, String>;

/// Translation lookup consumed by the pipeline and the shell.
pub trait Translate {
    /// Resolve `key` in the active language and substitute `params`.
    fn t(&self, key: &str, params: &Params<'_>) -> String;

    /// Resolve a key that takes no parameters.
    fn text(&self, key: &str) -> String {
        self.t(key, &Params::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Zh];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    /// Parse a locale tag such as `zh-CN`, `zh_TW.UTF-8` or `EN`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag
            .trim()
            .split(['-', '_', '.', '@'])
            .next()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match primary.as_str() {
            "en" => Some(Language::En),
            "zh" => Some(Language::Zh),
            _ => None,
        }
    }

    fn source(self) -> &'static str {
        match self {
            Language::En => include_str!("locales/en.json"),
            Language::Zh => include_str!("locales/zh.json"),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_tag(s).ok_or_else(|| format!("unsupported language `{s}`"))
    }
}

type Dictionary = HashMap<String, String>;

static EN: OnceLock<Dictionary> = OnceLock::new();
static ZH: OnceLock<Dictionary> = OnceLock::new();

fn dictionary(language: Language) -> &'static Dictionary {
    let cell = match language {
        Language::En => &EN,
        Language::Zh => &ZH,
    };
    cell.get_or_init(|| match serde_json::from_str(language.source()) {
        Ok(dictionary) => dictionary,
        Err(err) => {
            warn!(target: "i18n", language = %language, "failed to parse catalog: {err}");
            Dictionary::new()
        }
    })
}

/// Embedded catalog for one active language with English fallback.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    language: Language,
}

impl Catalog {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

impl Translate for Catalog {
    fn t(&self, key: &str, params: &Params<'_>) -> String {
        let template = dictionary(self.language)
            .get(key)
            .or_else(|| dictionary(Language::En).get(key))
            .map(String::as_str)
            .unwrap_or(key);
        interpolate(template, params)
    }
}

/// Replace `{name}` placeholders; unknown placeholders are left untouched.
pub fn interpolate(template: &str, params: &Params<'_>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match params.get(name) {
                    Some(value) => output.push_str(value),
                    None => {
                        output.push('{');
                        output.push_str(name);
                        output.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

/// Build a parameter map from `(name, value)` pairs.
pub fn params<'a, const N: usize>(pairs: [(&'a str, String); N]) -> Params<'a> {
    pairs.into_iter().collect()
}
