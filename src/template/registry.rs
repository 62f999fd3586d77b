//! Template registry: validation, dense ids, key and sign indexes.
//!
//! A [`TemplateRegistry`] is built in one go from declarations and is never
//! mutated afterwards. [`TemplateCatalog`] holds the current registry and
//! swaps in a complete replacement on reload, so readers holding a snapshot
//! see either the old set or the new set.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde::Serialize;
use thiserror::Error;

use crate::language::LanguageCode;
use crate::metrics::CatalogMetrics;

use super::parser::ParsedText;
use super::plural::Pluralizer;
use super::types::{Template, TemplateDef, TemplateFlags, TemplateId};

/// Translation tables: language -> template key -> text
pub type Translations = HashMap<LanguageCode, HashMap<String, String>>;

/// Everything needed to build a registry
#[derive(Debug, Clone, Default)]
pub struct CatalogSource {
    pub templates: Vec<TemplateDef>,
    pub translations: Translations,
    pub plurals: Pluralizer,
    /// Problems found while reading the source, carried into the report
    pub warnings: Vec<RegistryWarning>,
}

impl CatalogSource {
    pub fn from_templates(templates: Vec<TemplateDef>) -> Self {
        Self {
            templates,
            ..Default::default()
        }
    }
}

/// Definition problem found while building a registry. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryWarning {
    #[error("Template '{key}' has no audience metadata, using defaults")]
    MissingMetadata { key: String },

    #[error("Duplicate template key '{key}', later declaration dropped")]
    DuplicateKey { key: String },

    #[error("Template '{key}' has no text in the default language")]
    MissingDefaultText { key: String },

    #[error("Template '{key}' has invalid {language} text: {error}")]
    InvalidText {
        key: String,
        language: String,
        error: String,
        /// Default-language text is kept as a literal; translations are dropped
        kept_literal: bool,
    },

    #[error("Template '{key}' slot {slot} uses '{token}' but has arity {arity}")]
    InvalidPluralReference {
        key: String,
        slot: usize,
        token: String,
        arity: usize,
    },

    #[error("Sign key '{sign_key}' of '{key}' already bound to '{existing}'")]
    DuplicateSignKey {
        sign_key: String,
        key: String,
        existing: String,
    },

    #[error("Template '{key}' is flagged SIGN but has no sign key")]
    SignWithoutKey { key: String },

    #[error("Template '{key}' declares unknown flag '{flag}'")]
    UnknownFlag { key: String, flag: String },

    #[error("{} {language} translation(s) match no template", .keys.len())]
    OrphanTranslations { language: String, keys: Vec<String> },
}

impl RegistryWarning {
    /// Metric label; matches the serialized `kind` tag
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryWarning::MissingMetadata { .. } => "missing_metadata",
            RegistryWarning::DuplicateKey { .. } => "duplicate_key",
            RegistryWarning::MissingDefaultText { .. } => "missing_default_text",
            RegistryWarning::InvalidText { .. } => "invalid_text",
            RegistryWarning::InvalidPluralReference { .. } => "invalid_plural_reference",
            RegistryWarning::DuplicateSignKey { .. } => "duplicate_sign_key",
            RegistryWarning::SignWithoutKey { .. } => "sign_without_key",
            RegistryWarning::UnknownFlag { .. } => "unknown_flag",
            RegistryWarning::OrphanTranslations { .. } => "orphan_translations",
        }
    }
}

/// Templates translated into one language
#[derive(Debug, Clone, Serialize)]
pub struct LanguageCoverage {
    pub language: String,
    pub templates: usize,
}

/// Outcome of a registry build
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    pub generation: u64,
    pub templates_loaded: usize,
    pub signs_indexed: usize,
    pub languages: Vec<LanguageCoverage>,
    pub warnings: Vec<RegistryWarning>,
}

/// Immutable set of registered templates
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: Vec<Arc<Template>>,
    by_key: HashMap<String, TemplateId>,
    by_sign: HashMap<String, TemplateId>,
    pluralizer: Pluralizer,
    generation: u64,
}

impl TemplateRegistry {
    /// Validate and index `defs` in order. Ids are assigned sequentially from zero.
    pub fn build(
        defs: Vec<TemplateDef>,
        translations: Translations,
        pluralizer: Pluralizer,
        default_language: &LanguageCode,
        generation: u64,
    ) -> (Self, RegistryReport) {
        let mut builder = Builder {
            registry: TemplateRegistry {
                templates: Vec::with_capacity(defs.len()),
                by_key: HashMap::with_capacity(defs.len()),
                by_sign: HashMap::new(),
                pluralizer,
                generation,
            },
            warnings: Vec::new(),
        };

        for def in defs {
            builder.add(def, &translations, default_language);
        }
        builder.report_orphans(&translations);

        let registry = builder.registry;
        let report = RegistryReport {
            generation,
            templates_loaded: registry.templates.len(),
            signs_indexed: registry.by_sign.len(),
            languages: registry.coverage(),
            warnings: builder.warnings,
        };
        (registry, report)
    }

    pub fn by_id(&self, id: TemplateId) -> Option<&Arc<Template>> {
        self.templates.get(id.index())
    }

    pub fn by_key(&self, key: &str) -> Option<&Arc<Template>> {
        self.by_key.get(key).and_then(|id| self.by_id(*id))
    }

    pub fn by_sign_key(&self, sign_key: &str) -> Option<&Arc<Template>> {
        self.by_sign.get(sign_key).and_then(|id| self.by_id(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn signs(&self) -> usize {
        self.by_sign.len()
    }

    pub fn pluralizer(&self) -> &Pluralizer {
        &self.pluralizer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn coverage(&self) -> Vec<LanguageCoverage> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for template in &self.templates {
            for code in template.languages() {
                *counts.entry(code.as_str()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(language, templates)| LanguageCoverage {
                language: language.to_string(),
                templates,
            })
            .collect()
    }
}

struct Builder {
    registry: TemplateRegistry,
    warnings: Vec<RegistryWarning>,
}

impl Builder {
    fn warn(&mut self, warning: RegistryWarning, suppressed: bool) {
        if suppressed {
            tracing::debug!(warning = %warning, "Template registry warning (suppressed)");
        } else {
            tracing::warn!(warning = %warning, "Template registry warning");
        }
        self.warnings.push(warning);
    }

    fn add(&mut self, def: TemplateDef, translations: &Translations, default_language: &LanguageCode) {
        let suppressed = def
            .flags
            .is_some_and(|f| f.contains(TemplateFlags::SUPPRESS_WARNINGS));

        if self.registry.by_key.contains_key(&def.key) {
            self.warn(RegistryWarning::DuplicateKey { key: def.key }, suppressed);
            return;
        }

        let has_metadata = def.flags.is_some();
        if !has_metadata {
            self.warn(
                RegistryWarning::MissingMetadata {
                    key: def.key.clone(),
                },
                false,
            );
        }
        let flags = def.flags.unwrap_or_default();
        let arity = def.slots.len();

        let mut texts: Vec<(LanguageCode, ParsedText)> = Vec::new();
        if def.text.is_empty() {
            self.warn(
                RegistryWarning::MissingDefaultText {
                    key: def.key.clone(),
                },
                suppressed,
            );
        } else {
            let parsed = match parse_checked(&def.text, arity) {
                Ok(parsed) => parsed,
                Err(error) => {
                    self.warn(
                        RegistryWarning::InvalidText {
                            key: def.key.clone(),
                            language: default_language.to_string(),
                            error,
                            kept_literal: true,
                        },
                        suppressed,
                    );
                    ParsedText::literal(&def.text)
                }
            };
            texts.push((default_language.clone(), parsed));
        }

        let mut table_languages: Vec<&LanguageCode> = translations.keys().collect();
        table_languages.sort();
        let table = table_languages.into_iter().filter_map(|language| {
            translations[language]
                .get(&def.key)
                .map(|text| (language.clone(), text.as_str()))
        });
        let inline = def
            .translations
            .iter()
            .map(|(language, text)| (language.clone(), text.as_str()));

        for (language, text) in inline.chain(table).collect::<Vec<_>>() {
            if texts.iter().any(|(code, _)| *code == language) {
                continue;
            }
            match parse_checked(text, arity) {
                Ok(parsed) => texts.push((language, parsed)),
                Err(error) => self.warn(
                    RegistryWarning::InvalidText {
                        key: def.key.clone(),
                        language: language.to_string(),
                        error,
                        kept_literal: false,
                    },
                    suppressed,
                ),
            }
        }

        for (slot, spec) in def.slots.iter().enumerate() {
            for formatter in &spec.formatters {
                let Some(reference) = formatter.plural_reference() else {
                    continue;
                };
                let valid = reference
                    .trim()
                    .parse::<usize>()
                    .is_ok_and(|index| index < arity);
                if !valid {
                    self.warn(
                        RegistryWarning::InvalidPluralReference {
                            key: def.key.clone(),
                            slot,
                            token: formatter.name().to_string(),
                            arity,
                        },
                        suppressed,
                    );
                }
            }
        }

        let id = TemplateId(self.registry.templates.len() as u32);

        match &def.sign_key {
            Some(sign_key) => {
                if let Some(existing) = self.registry.by_sign.get(sign_key) {
                    let existing = self.registry.templates[existing.index()].key.clone();
                    self.warn(
                        RegistryWarning::DuplicateSignKey {
                            sign_key: sign_key.clone(),
                            key: def.key.clone(),
                            existing,
                        },
                        suppressed,
                    );
                } else {
                    self.registry.by_sign.insert(sign_key.clone(), id);
                }
            }
            None if flags.contains(TemplateFlags::SIGN) => {
                self.warn(
                    RegistryWarning::SignWithoutKey {
                        key: def.key.clone(),
                    },
                    suppressed,
                );
            }
            None => {}
        }

        self.registry.by_key.insert(def.key.clone(), id);
        self.registry.templates.push(Arc::new(Template {
            id,
            key: def.key,
            flags,
            has_metadata,
            sign_key: def.sign_key,
            description: def.description,
            slots: def.slots,
            texts,
        }));
    }

    fn report_orphans(&mut self, translations: &Translations) {
        let mut languages: Vec<&LanguageCode> = translations.keys().collect();
        languages.sort();

        for language in languages {
            let mut keys: Vec<String> = translations[language]
                .keys()
                .filter(|key| !self.registry.by_key.contains_key(*key))
                .cloned()
                .collect();
            if keys.is_empty() {
                continue;
            }
            keys.sort();
            self.warn(
                RegistryWarning::OrphanTranslations {
                    language: language.to_string(),
                    keys,
                },
                false,
            );
        }
    }
}

fn parse_checked(text: &str, arity: usize) -> Result<ParsedText, String> {
    let parsed = ParsedText::parse(text).map_err(|e| e.to_string())?;
    parsed.validate(arity).map_err(|e| e.to_string())?;
    Ok(parsed)
}

/// Holds the current registry and swaps in replacements atomically.
///
/// Installs are serialized, so generations become current in order.
pub struct TemplateCatalog {
    current: ArcSwap<TemplateRegistry>,
    /// Generation of the last installed registry; held for the whole install
    installed: Mutex<u64>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateCatalog {
    /// An empty catalog (generation 0)
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(TemplateRegistry::default()),
            installed: Mutex::new(0),
        }
    }

    /// Build a complete registry from `source` and make it current
    pub fn register(&self, source: CatalogSource, default_language: &LanguageCode) -> RegistryReport {
        let mut installed = self.installed.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = *installed + 1;
        let (registry, mut report) = TemplateRegistry::build(
            source.templates,
            source.translations,
            source.plurals,
            default_language,
            generation,
        );

        if !source.warnings.is_empty() {
            let mut warnings = source.warnings;
            warnings.append(&mut report.warnings);
            report.warnings = warnings;
        }

        self.current.store(Arc::new(registry));
        *installed = generation;
        drop(installed);

        CatalogMetrics::record_load(&report);
        tracing::info!(
            generation,
            templates = report.templates_loaded,
            signs = report.signs_indexed,
            languages = report.languages.len(),
            warnings = report.warnings.len(),
            "Template registry installed"
        );
        report
    }

    /// Current registry; stays valid across later reloads
    pub fn snapshot(&self) -> Arc<TemplateRegistry> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatterRef;
    use crate::template::SlotSpec;

    fn en() -> LanguageCode {
        LanguageCode::new("en-us")
    }

    fn def(key: &str, text: &str) -> TemplateDef {
        TemplateDef::builder(key, text)
            .flags(TemplateFlags::empty())
            .build()
    }

    #[test]
    fn test_sequential_ids_and_lookup() {
        let (registry, report) = TemplateRegistry::build(
            vec![def("a", "A"), def("b", "B"), def("c", "C")],
            Translations::new(),
            Pluralizer::new(),
            &en(),
            1,
        );

        assert_eq!(report.templates_loaded, 3);
        assert!(report.warnings.is_empty());
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            let template = registry.by_key(key).unwrap();
            assert_eq!(template.id, TemplateId(i as u32));
            assert_eq!(registry.by_id(template.id).unwrap().key, *key);
        }
        assert!(registry.by_id(TemplateId(3)).is_none());
    }

    #[test]
    fn test_duplicate_key_dropped() {
        let (registry, report) = TemplateRegistry::build(
            vec![def("a", "first"), def("a", "second"), def("b", "B")],
            Translations::new(),
            Pluralizer::new(),
            &en(),
            1,
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.by_key("b").unwrap().id, TemplateId(1));
        assert_eq!(
            registry.by_key("a").unwrap().text_for(&en()).unwrap().raw(),
            "first"
        );
        assert_eq!(
            report.warnings,
            vec![RegistryWarning::DuplicateKey {
                key: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_metadata_uses_defaults() {
        let (registry, report) = TemplateRegistry::build(
            vec![TemplateDef::builder("bare", "text").build()],
            Translations::new(),
            Pluralizer::new(),
            &en(),
            1,
        );

        let template = registry.by_key("bare").unwrap();
        assert!(!template.has_metadata);
        assert_eq!(template.flags, TemplateFlags::empty());
        assert!(matches!(
            report.warnings[0],
            RegistryWarning::MissingMetadata { .. }
        ));
    }

    #[test]
    fn test_sign_collisions_keep_first() {
        let (registry, report) = TemplateRegistry::build(
            vec![
                TemplateDef::builder("first", "1").sign("lobby").build(),
                TemplateDef::builder("second", "2").sign("lobby").build(),
                TemplateDef::builder("orphan_sign", "3")
                    .flags(TemplateFlags::SIGN)
                    .build(),
            ],
            Translations::new(),
            Pluralizer::new(),
            &en(),
            1,
        );

        assert_eq!(registry.by_sign_key("lobby").unwrap().key, "first");
        assert_eq!(registry.signs(), 1);
        assert_eq!(report.signs_indexed, 1);
        assert_eq!(
            report.warnings,
            vec![
                RegistryWarning::DuplicateSignKey {
                    sign_key: "lobby".to_string(),
                    key: "second".to_string(),
                    existing: "first".to_string(),
                },
                RegistryWarning::SignWithoutKey {
                    key: "orphan_sign".to_string()
                },
            ]
        );
        // Both templates remain addressable by key
        assert!(registry.by_key("second").is_some());
    }

    #[test]
    fn test_invalid_texts() {
        let mut translations = Translations::new();
        translations.insert(
            LanguageCode::new("de-de"),
            HashMap::from([("broken".to_string(), "kaputt {3}".to_string())]),
        );

        let (registry, report) = TemplateRegistry::build(
            vec![TemplateDef::builder("broken", "broken {0")
                .arg()
                .flags(TemplateFlags::empty())
                .build()],
            translations,
            Pluralizer::new(),
            &en(),
            1,
        );

        let template = registry.by_key("broken").unwrap();
        assert_eq!(template.text_for(&en()).unwrap().raw(), "broken {0");
        assert!(!template.has_text(&LanguageCode::new("de-de")));
        assert_eq!(report.warnings.len(), 2);
        assert!(matches!(
            &report.warnings[0],
            RegistryWarning::InvalidText { kept_literal: true, .. }
        ));
        assert!(matches!(
            &report.warnings[1],
            RegistryWarning::InvalidText { kept_literal: false, language, .. } if language == "de-de"
        ));
    }

    #[test]
    fn test_translations_and_coverage() {
        let mut translations = Translations::new();
        translations.insert(
            LanguageCode::new("ru-ru"),
            HashMap::from([
                ("a".to_string(), "А".to_string()),
                ("ghost".to_string(), "?".to_string()),
            ]),
        );

        let (registry, report) = TemplateRegistry::build(
            vec![
                TemplateDef::builder("a", "A")
                    .flags(TemplateFlags::empty())
                    .translation("de-de", "A-de")
                    .build(),
                TemplateDef::builder("foreign_only", "")
                    .flags(TemplateFlags::empty())
                    .translation("de-de", "nur deutsch")
                    .build(),
            ],
            translations,
            Pluralizer::new(),
            &en(),
            1,
        );

        let a = registry.by_key("a").unwrap();
        let languages: Vec<&str> = a.languages().map(LanguageCode::as_str).collect();
        assert_eq!(languages, vec!["en-us", "de-de", "ru-ru"]);

        let foreign = registry.by_key("foreign_only").unwrap();
        assert_eq!(foreign.first_language().unwrap().as_str(), "de-de");

        let coverage: Vec<(&str, usize)> = report
            .languages
            .iter()
            .map(|c| (c.language.as_str(), c.templates))
            .collect();
        assert_eq!(coverage, vec![("de-de", 2), ("en-us", 1), ("ru-ru", 1)]);

        assert!(report.warnings.contains(&RegistryWarning::MissingDefaultText {
            key: "foreign_only".to_string()
        }));
        assert!(report.warnings.contains(&RegistryWarning::OrphanTranslations {
            language: "ru-ru".to_string(),
            keys: vec!["ghost".to_string()],
        }));
    }

    #[test]
    fn test_plural_reference_checked_against_arity() {
        let (_, report) = TemplateRegistry::build(
            vec![TemplateDef::builder("kills", "{0}")
                .slot(SlotSpec::any().format(FormatterRef::token("plural:3")))
                .flags(TemplateFlags::empty())
                .build()],
            Translations::new(),
            Pluralizer::new(),
            &en(),
            1,
        );

        assert_eq!(
            report.warnings,
            vec![RegistryWarning::InvalidPluralReference {
                key: "kills".to_string(),
                slot: 0,
                token: "plural:3".to_string(),
                arity: 1,
            }]
        );
    }

    #[test]
    fn test_catalog_swap_and_snapshot() {
        let catalog = TemplateCatalog::new();
        assert_eq!(catalog.generation(), 0);
        assert!(catalog.snapshot().is_empty());

        let report = catalog.register(CatalogSource::from_templates(vec![def("a", "A")]), &en());
        assert_eq!(report.generation, 1);

        let old = catalog.snapshot();
        let mut source = CatalogSource::from_templates(vec![def("a", "A2"), def("b", "B")]);
        source.warnings.push(RegistryWarning::UnknownFlag {
            key: "b".to_string(),
            flag: "SPARKLE".to_string(),
        });
        let report = catalog.register(source, &en());

        assert_eq!(report.generation, 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(old.len(), 1);
        assert_eq!(catalog.snapshot().len(), 2);
        assert_eq!(catalog.generation(), 2);
    }

    #[test]
    fn test_concurrent_installs_keep_newest() {
        let catalog = TemplateCatalog::new();
        let reports = std::sync::Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for worker in 0..6 {
                let catalog = &catalog;
                let reports = &reports;
                scope.spawn(move || {
                    for round in 0..25 {
                        let key = format!("w{}_{}", worker, round);
                        let report = catalog
                            .register(CatalogSource::from_templates(vec![def(&key, "x")]), &en());
                        reports.lock().unwrap().push(report.generation);
                    }
                });
            }

            // Readers never see the generation go backwards
            let catalog = &catalog;
            scope.spawn(move || {
                let mut last = 0;
                for _ in 0..500 {
                    let generation = catalog.snapshot().generation();
                    assert!(generation >= last, "generation went from {} to {}", last, generation);
                    last = generation;
                }
            });
        });

        let mut generations = reports.into_inner().unwrap();
        generations.sort_unstable();
        assert_eq!(generations, (1..=150).collect::<Vec<u64>>());
        assert_eq!(catalog.generation(), 150);
        assert_eq!(catalog.snapshot().generation(), 150);
    }
}
