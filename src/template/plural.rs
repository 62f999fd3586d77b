//! Rule-based pluralization of literal text.
//!
//! English-family languages use suffix rules plus a built-in irregular
//! table. Every other language appends `s` unless an irregular form has been
//! declared for it. Only the last word of a phrase is inflected.

use std::collections::HashMap;

use crate::language::LanguageCode;

const ENGLISH_IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("goose", "geese"),
    ("is", "are"),
    ("was", "were"),
    ("has", "have"),
    ("this", "these"),
    ("that", "those"),
    ("it", "they"),
    ("its", "their"),
    ("knife", "knives"),
    ("life", "lives"),
];

const ENGLISH_UNCOUNTABLE: &[&str] = &[
    "sheep", "fish", "deer", "aircraft", "ammo", "equipment", "information", "series",
];

/// Pluralizes literal text spans, with per-language irregular tables
#[derive(Debug, Clone, Default)]
pub struct Pluralizer {
    irregular: HashMap<LanguageCode, HashMap<String, String>>,
}

impl Pluralizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an irregular plural for a language
    pub fn declare(&mut self, language: &LanguageCode, singular: &str, plural: &str) {
        self.irregular
            .entry(language.clone())
            .or_default()
            .insert(singular.to_lowercase(), plural.to_lowercase());
    }

    /// Number of declared irregular forms across all languages
    pub fn declared_count(&self) -> usize {
        self.irregular.values().map(HashMap::len).sum()
    }

    /// Plural form of `text` in `language`
    pub fn pluralize(&self, language: &LanguageCode, text: &str) -> String {
        let trimmed = text.trim_end();
        let word_start = trimmed
            .rfind(|c: char| c.is_whitespace())
            .map(|i| i + 1)
            .unwrap_or(0);
        let (prefix, word) = trimmed.split_at(word_start);
        if word.is_empty() {
            return text.to_string();
        }

        let plural = self.pluralize_word(language, word);
        format!("{}{}{}", prefix, plural, &text[trimmed.len()..])
    }

    fn pluralize_word(&self, language: &LanguageCode, word: &str) -> String {
        let lower = word.to_lowercase();

        if let Some(plural) = self.irregular.get(language).and_then(|t| t.get(&lower)) {
            return match_case(word, plural);
        }

        if !language.is_english() {
            return format!("{}{}", word, suffix_case(word, "s"));
        }

        if let Some((_, plural)) = ENGLISH_IRREGULAR.iter().find(|(s, _)| *s == lower) {
            return match_case(word, plural);
        }
        if ENGLISH_UNCOUNTABLE.contains(&lower.as_str()) {
            return word.to_string();
        }

        let suffix = english_suffix(&lower);
        match suffix {
            EnglishSuffix::Ies => {
                let stem = &word[..word.len() - 1];
                format!("{}{}", stem, suffix_case(word, "ies"))
            }
            EnglishSuffix::Es => format!("{}{}", word, suffix_case(word, "es")),
            EnglishSuffix::S => format!("{}{}", word, suffix_case(word, "s")),
        }
    }
}

enum EnglishSuffix {
    S,
    Es,
    Ies,
}

fn english_suffix(lower: &str) -> EnglishSuffix {
    let bytes = lower.as_bytes();
    if lower.ends_with('y') && bytes.len() >= 2 && !b"aeiou".contains(&bytes[bytes.len() - 2]) {
        return EnglishSuffix::Ies;
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return EnglishSuffix::Es;
    }
    EnglishSuffix::S
}

fn is_all_upper(word: &str) -> bool {
    word.chars().any(char::is_alphabetic) && !word.chars().any(char::is_lowercase)
}

fn suffix_case(word: &str, suffix: &str) -> String {
    if is_all_upper(word) && word.chars().filter(|c| c.is_alphabetic()).count() > 1 {
        suffix.to_uppercase()
    } else {
        suffix.to_string()
    }
}

fn match_case(original: &str, replacement: &str) -> String {
    if is_all_upper(original) && original.chars().count() > 1 {
        return replacement.to_uppercase();
    }

    let mut chars = original.chars();
    if chars.next().is_some_and(char::is_uppercase) {
        let mut out = String::with_capacity(replacement.len());
        let mut rep = replacement.chars();
        if let Some(first) = rep.next() {
            out.extend(first.to_uppercase());
        }
        out.push_str(rep.as_str());
        return out;
    }

    replacement.to_string()
}
