//! Languages and the per-template language fallback chain.
//!
//! # Fallback chain
//!
//! For a given template and recipient preference the resolver tries, in order:
//!
//! 1. the recipient's language (by code or alias), if the template is translated into it
//! 2. the default language, if the template is translated into it
//! 3. the first language that has any translation for the template
//! 4. the bare template key
//!
//! The chain is evaluated per template because translation coverage differs
//! between templates.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::template::Template;

/// Normalized (lower-case) language code, cheap to clone
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LanguageCode(Arc<str>);

impl LanguageCode {
    pub fn new(code: &str) -> Self {
        Self(Arc::from(code.trim().to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// English-family code (`en`, `en-us`, `en-gb`, ...)
    pub fn is_english(&self) -> bool {
        &*self.0 == "en" || self.0.starts_with("en-")
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for LanguageCode {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0.to_string()
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A configured language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub code: LanguageCode,

    /// Name shown to players when they pick a language
    #[serde(default)]
    pub display_name: String,

    /// Extra names a player may type (`"english"`, `"de-de"`, ...)
    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,

    #[serde(default = "default_group_separator")]
    pub group_separator: char,
}

fn default_decimal_separator() -> char {
    '.'
}

fn default_group_separator() -> char {
    ','
}

impl LanguageInfo {
    pub fn new(code: &str) -> Self {
        Self {
            code: LanguageCode::new(code),
            display_name: code.to_string(),
            aliases: Vec::new(),
            decimal_separator: default_decimal_separator(),
            group_separator: default_group_separator(),
        }
    }

    pub fn with_separators(mut self, decimal: char, group: char) -> Self {
        self.decimal_separator = decimal;
        self.group_separator = group;
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    fn matches(&self, normalized: &str) -> bool {
        self.code.as_str() == normalized
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(normalized))
    }
}

/// The set of languages known to the engine, with one default
#[derive(Debug, Clone)]
pub struct LanguageSet {
    default: LanguageCode,
    languages: Vec<LanguageInfo>,
}

impl LanguageSet {
    /// Build a language set; the default language is added if missing and always listed first
    pub fn new(default: &str, languages: Vec<LanguageInfo>) -> Self {
        let default = LanguageCode::new(default);
        let mut ordered: Vec<LanguageInfo> = Vec::with_capacity(languages.len() + 1);

        for info in languages {
            if ordered.iter().any(|l| l.code == info.code) {
                tracing::warn!(language = %info.code, "Duplicate language configured, ignoring");
                continue;
            }
            ordered.push(info);
        }

        match ordered.iter().position(|l| l.code == default) {
            Some(0) => {}
            Some(pos) => {
                let info = ordered.remove(pos);
                ordered.insert(0, info);
            }
            None => ordered.insert(0, LanguageInfo::new(default.as_str())),
        }

        Self {
            default,
            languages: ordered,
        }
    }

    /// A set holding only the given default language
    pub fn single(default: &str) -> Self {
        Self::new(default, Vec::new())
    }

    pub fn default_code(&self) -> &LanguageCode {
        &self.default
    }

    pub fn default_info(&self) -> &LanguageInfo {
        &self.languages[0]
    }

    pub fn is_default(&self, code: &LanguageCode) -> bool {
        &self.default == code
    }

    /// Look up a language by code or alias (case-insensitive)
    pub fn get(&self, code_or_alias: &str) -> Option<&LanguageInfo> {
        let normalized = code_or_alias.trim().to_ascii_lowercase();
        self.languages.iter().find(|l| l.matches(&normalized))
    }

    /// Info for a resolved code, or the default language's info
    pub fn info_or_default(&self, code: &LanguageCode) -> &LanguageInfo {
        self.languages
            .iter()
            .find(|l| &l.code == code)
            .unwrap_or_else(|| self.default_info())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageInfo> {
        self.languages.iter()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

/// The language chosen for one template render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLanguage {
    pub code: LanguageCode,
    pub is_default: bool,
}

/// Outcome of walking the fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "language", rename_all = "snake_case")]
pub enum Resolution {
    Language(ResolvedLanguage),
    /// No translation at all; render the template key
    KeyOnly,
}

impl Resolution {
    pub fn language(&self) -> Option<&LanguageCode> {
        match self {
            Resolution::Language(resolved) => Some(&resolved.code),
            Resolution::KeyOnly => None,
        }
    }
}

/// Walks the fallback chain against a [`LanguageSet`]
#[derive(Debug, Clone, Copy)]
pub struct LanguageResolver<'a> {
    languages: &'a LanguageSet,
}

impl<'a> LanguageResolver<'a> {
    pub fn new(languages: &'a LanguageSet) -> Self {
        Self { languages }
    }

    /// Resolve the language a recipient with `preference` reads `template` in
    pub fn resolve(&self, preference: Option<&str>, template: &Template) -> Resolution {
        if let Some(code) = preference.and_then(|p| self.preference_code(p)) {
            if template.has_text(&code) {
                return self.resolved(&code);
            }
        }

        let default = self.languages.default_code();
        if template.has_text(default) {
            return self.resolved(default);
        }

        match template.first_language() {
            Some(code) => self.resolved(code),
            None => Resolution::KeyOnly,
        }
    }

    /// Template-independent resolution: the preferred language, else the default
    pub fn preferred(&self, preference: Option<&str>) -> ResolvedLanguage {
        let code = preference
            .and_then(|p| self.preference_code(p))
            .unwrap_or_else(|| self.languages.default_code().clone());

        ResolvedLanguage {
            is_default: self.languages.is_default(&code),
            code,
        }
    }

    /// Configured code for a code or alias; unconfigured codes are taken as written
    fn preference_code(&self, preference: &str) -> Option<LanguageCode> {
        if let Some(info) = self.languages.get(preference) {
            return Some(info.code.clone());
        }
        let code = LanguageCode::new(preference);
        (!code.as_str().is_empty()).then_some(code)
    }

    fn resolved(&self, code: &LanguageCode) -> Resolution {
        Resolution::Language(ResolvedLanguage {
            code: code.clone(),
            is_default: self.languages.is_default(code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Pluralizer, TemplateDef, TemplateRegistry};

    fn languages() -> LanguageSet {
        LanguageSet::new(
            "en-us",
            vec![
                LanguageInfo::new("de-de").with_alias("german").with_separators(',', '.'),
                LanguageInfo::new("ru-ru"),
            ],
        )
    }

    #[test]
    fn test_code_is_normalized() {
        assert_eq!(LanguageCode::new(" EN-US "), LanguageCode::new("en-us"));
        assert!(LanguageCode::new("en-GB").is_english());
        assert!(!LanguageCode::new("es-es").is_english());
    }

    #[test]
    fn test_default_is_listed_first() {
        let set = LanguageSet::new("ru-ru", vec![LanguageInfo::new("en-us"), LanguageInfo::new("ru-ru")]);
        assert_eq!(set.default_info().code.as_str(), "ru-ru");
        assert_eq!(set.len(), 2);

        let set = LanguageSet::single("en-us");
        assert_eq!(set.len(), 1);
        assert!(set.is_default(&LanguageCode::new("EN-US")));
    }

    #[test]
    fn test_lookup_by_alias() {
        let set = languages();
        assert_eq!(set.get("German").unwrap().code.as_str(), "de-de");
        assert_eq!(set.get("DE-DE").unwrap().decimal_separator, ',');
        assert!(set.get("fr-fr").is_none());
    }

    #[test]
    fn test_preferred_language() {
        let set = languages();
        let resolver = LanguageResolver::new(&set);

        let resolved = resolver.preferred(Some("german"));
        assert_eq!(resolved.code.as_str(), "de-de");
        assert!(!resolved.is_default);

        let resolved = resolver.preferred(Some("Klingon"));
        assert_eq!(resolved.code.as_str(), "klingon");
        assert!(!resolved.is_default);

        assert!(resolver.preferred(Some("  ")).is_default);
        assert!(resolver.preferred(None).is_default);
    }

    fn template(default_text: &str, translations: &[(&str, &str)]) -> Template {
        let mut def = TemplateDef::builder("greeting", default_text);
        for (language, text) in translations {
            def = def.translation(language, *text);
        }
        let defs = vec![def.build()];
        let (registry, _) = TemplateRegistry::build(
            defs,
            Default::default(),
            Pluralizer::new(),
            &LanguageCode::new("en-us"),
            1,
        );
        (**registry.by_key("greeting").unwrap()).clone()
    }

    #[test]
    fn test_resolve_fallback_chain() {
        let set = languages();
        let resolver = LanguageResolver::new(&set);

        let full = template("Hello", &[("de-de", "Hallo"), ("fr-fr", "Bonjour")]);
        let russian_only = template("", &[("ru-ru", "Привет")]);
        let empty = template("", &[]);

        // (template, preference, expected language; None = key only)
        let cases: Vec<(&Template, Option<&str>, Option<&str>)> = vec![
            // assigned language with a translation
            (&full, Some("de-de"), Some("de-de")),
            (&full, Some("German"), Some("de-de")),
            // assigned but not configured, translation present
            (&full, Some("fr-fr"), Some("fr-fr")),
            (&full, Some("FR-FR"), Some("fr-fr")),
            // assigned language without a translation falls to the default
            (&full, Some("ru-ru"), Some("en-us")),
            (&full, Some("klingon"), Some("en-us")),
            (&full, None, Some("en-us")),
            (&full, Some(""), Some("en-us")),
            // no default text: first available translation
            (&russian_only, Some("de-de"), Some("ru-ru")),
            (&russian_only, None, Some("ru-ru")),
            // nothing at all
            (&empty, Some("de-de"), None),
            (&empty, None, None),
        ];

        for (template, preference, expected) in cases {
            let resolution = resolver.resolve(preference, template);
            assert_eq!(
                resolution.language().map(|code| code.as_str()),
                expected,
                "preference {:?} on {:?}",
                preference,
                template.languages().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_resolved_marks_default() {
        let set = languages();
        let resolver = LanguageResolver::new(&set);
        let full = template("Hello", &[("fr-fr", "Bonjour")]);

        match resolver.resolve(None, &full) {
            Resolution::Language(resolved) => assert!(resolved.is_default),
            Resolution::KeyOnly => panic!("expected the default language"),
        }
        match resolver.resolve(Some("fr-fr"), &full) {
            Resolution::Language(resolved) => assert!(!resolved.is_default),
            Resolution::KeyOnly => panic!("expected fr-fr"),
        }
    }
}
