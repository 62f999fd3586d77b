//! Catalog directory loader.
//!
//! ```text
//! catalog/
//!   templates.json          [{ "key", "text", "args", "flags", "sign", "description" }]
//!   translations/de-de.json { "<key>": "<text>" }
//!   plurals.json            { "<lang>": { "<singular>": "<plural>" } }   (optional)
//!   palette.json            { "<color key>": "#rrggbb" }                (optional)
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::color::Color;
use crate::format::FormatterRef;
use crate::language::LanguageCode;

use super::plural::Pluralizer;
use super::registry::{CatalogSource, RegistryWarning, Translations};
use super::types::{SlotSpec, TemplateDef, TemplateFlags};

const TEMPLATES_FILE: &str = "templates.json";
const TRANSLATIONS_DIR: &str = "translations";
const PLURALS_FILE: &str = "plurals.json";
const PALETTE_FILE: &str = "palette.json";

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One entry of `templates.json`
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDecl {
    pub key: String,
    pub text: String,
    #[serde(default)]
    pub args: Vec<ArgDecl>,
    /// Absent means the declaration carries no audience metadata
    #[serde(default)]
    pub flags: Option<Vec<String>>,
    #[serde(default)]
    pub sign: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArgDecl {
    #[serde(rename = "type", default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub format: Tokens,
}

/// A single format token or a chain of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Tokens {
    One(String),
    Many(Vec<String>),
}

impl Default for Tokens {
    fn default() -> Self {
        Tokens::Many(Vec::new())
    }
}

impl Tokens {
    fn into_vec(self) -> Vec<String> {
        match self {
            Tokens::One(token) => vec![token],
            Tokens::Many(tokens) => tokens,
        }
    }
}

impl TemplateDecl {
    /// Convert into a definition, reporting flag names nobody knows
    pub fn into_def(self, warnings: &mut Vec<RegistryWarning>) -> TemplateDef {
        let flags = self.flags.map(|names| {
            names.iter().fold(TemplateFlags::empty(), |flags, name| {
                match TemplateFlags::parse_name(name) {
                    Some(flag) => flags | flag,
                    None => {
                        warnings.push(RegistryWarning::UnknownFlag {
                            key: self.key.clone(),
                            flag: name.clone(),
                        });
                        flags
                    }
                }
            })
        });

        let slots = self
            .args
            .into_iter()
            .map(|arg| SlotSpec {
                value_type: arg.value_type.map(|t| t.to_ascii_lowercase()),
                formatters: arg
                    .format
                    .into_vec()
                    .into_iter()
                    .map(FormatterRef::Token)
                    .collect(),
            })
            .collect();

        TemplateDef {
            key: self.key,
            text: self.text,
            slots,
            flags,
            sign_key: self.sign,
            description: self.description,
            translations: Vec::new(),
        }
    }
}

/// Read templates, translations and plural tables from a catalog directory
pub fn load_catalog(dir: &Path) -> Result<CatalogSource, LoaderError> {
    let decls: Vec<TemplateDecl> = read_json(&dir.join(TEMPLATES_FILE))?;
    let mut warnings = Vec::new();
    let templates = decls
        .into_iter()
        .map(|decl| decl.into_def(&mut warnings))
        .collect();

    let translations = load_translations(&dir.join(TRANSLATIONS_DIR))?;

    let mut plurals = Pluralizer::new();
    let plurals_path = dir.join(PLURALS_FILE);
    if plurals_path.exists() {
        let tables: HashMap<String, HashMap<String, String>> = read_json(&plurals_path)?;
        for (language, table) in tables {
            let language = LanguageCode::new(&language);
            for (singular, plural) in table {
                plurals.declare(&language, &singular, &plural);
            }
        }
    }

    tracing::debug!(
        dir = %dir.display(),
        translations = translations.len(),
        irregular_plurals = plurals.declared_count(),
        "Catalog read"
    );

    Ok(CatalogSource {
        templates,
        translations,
        plurals,
        warnings,
    })
}

/// Read `palette.json`; `None` when the catalog ships no palette
pub fn load_palette(dir: &Path) -> Result<Option<HashMap<String, Color>>, LoaderError> {
    let path = dir.join(PALETTE_FILE);
    if !path.exists() {
        return Ok(None);
    }
    read_json(&path).map(Some)
}

fn load_translations(dir: &Path) -> Result<Translations, LoaderError> {
    let mut translations = Translations::new();
    if !dir.is_dir() {
        return Ok(translations);
    }

    let entries = fs::read_dir(dir).map_err(|source| LoaderError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| LoaderError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(language) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let table: HashMap<String, String> = read_json(&path)?;
        translations
            .entry(LanguageCode::new(language))
            .or_default()
            .extend(table);
    }

    Ok(translations)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoaderError> {
    let raw = fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| LoaderError::Json {
        path: path.to_path_buf(),
        source,
    })
}
