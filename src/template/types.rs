//! Template declarations and registered templates

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::color::Markup;
use crate::format::FormatterRef;
use crate::language::LanguageCode;

use super::parser::ParsedText;

bitflags! {
    /// Audience and rendering flags of a template
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TemplateFlags: u8 {
        /// Rendered separately for each team
        const PER_TEAM = 1;
        /// Strip color envelopes (console mirrors, logs)
        const NO_COLOR = 1 << 1;
        /// Registry warnings are logged at debug level
        const SUPPRESS_WARNINGS = 1 << 2;
        /// Bound to an in-world sign
        const SIGN = 1 << 3;
        /// Use widget rich text instead of engine rich text
        const WIDGET_MARKUP = 1 << 4;
    }
}

impl TemplateFlags {
    /// Parse one flag name, case-insensitively (`"per_team"`, `"NO_COLOR"`)
    pub fn parse_name(name: &str) -> Option<Self> {
        Self::from_name(&name.trim().to_ascii_uppercase())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// Dense template index, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub u32);

impl TemplateId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One argument slot: optional declared type plus a formatter chain
#[derive(Debug, Clone, Default)]
pub struct SlotSpec {
    pub value_type: Option<String>,
    pub formatters: Vec<FormatterRef>,
}

impl SlotSpec {
    /// Slot accepting any value
    pub fn any() -> Self {
        Self::default()
    }

    pub fn typed(value_type: &str) -> Self {
        Self {
            value_type: Some(value_type.to_ascii_lowercase()),
            formatters: Vec::new(),
        }
    }

    /// Append a formatter to the chain
    pub fn format(mut self, formatter: impl Into<FormatterRef>) -> Self {
        self.formatters.push(formatter.into());
        self
    }
}

/// A template as declared by the host, before validation
#[derive(Debug, Clone)]
pub struct TemplateDef {
    pub key: String,
    /// Text in the default language
    pub text: String,
    pub slots: Vec<SlotSpec>,
    /// `None` when the declaration carries no audience metadata
    pub flags: Option<TemplateFlags>,
    pub sign_key: Option<String>,
    pub description: Option<String>,
    /// Inline translations; merged with catalog translation tables
    pub translations: Vec<(LanguageCode, String)>,
}

impl TemplateDef {
    pub fn builder(key: impl Into<String>, text: impl Into<String>) -> TemplateDefBuilder {
        TemplateDefBuilder::new(key, text)
    }
}

/// Builder for [`TemplateDef`]
#[derive(Debug, Clone)]
pub struct TemplateDefBuilder {
    def: TemplateDef,
}

impl TemplateDefBuilder {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            def: TemplateDef {
                key: key.into(),
                text: text.into(),
                slots: Vec::new(),
                flags: None,
                sign_key: None,
                description: None,
                translations: Vec::new(),
            },
        }
    }

    /// Add an untyped slot without formatters
    pub fn arg(self) -> Self {
        self.slot(SlotSpec::any())
    }

    pub fn slot(mut self, slot: SlotSpec) -> Self {
        self.def.slots.push(slot);
        self
    }

    /// Set the audience flags
    pub fn flags(mut self, flags: TemplateFlags) -> Self {
        self.def.flags = Some(flags);
        self
    }

    /// Bind to a sign; also sets [`TemplateFlags::SIGN`]
    pub fn sign(mut self, sign_key: impl Into<String>) -> Self {
        self.def.sign_key = Some(sign_key.into());
        self.def.flags = Some(self.def.flags.unwrap_or_default() | TemplateFlags::SIGN);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.def.description = Some(description.into());
        self
    }

    pub fn translation(mut self, language: &str, text: impl Into<String>) -> Self {
        self.def
            .translations
            .push((LanguageCode::new(language), text.into()));
        self
    }

    pub fn build(self) -> TemplateDef {
        self.def
    }
}

/// A validated, registered template. Immutable.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: TemplateId,
    pub key: String,
    pub flags: TemplateFlags,
    /// False when flags were defaulted because the declaration had none
    pub has_metadata: bool,
    pub sign_key: Option<String>,
    pub description: Option<String>,
    pub slots: Vec<SlotSpec>,
    /// Parsed text per language; the default language, when present, comes first
    pub(crate) texts: Vec<(LanguageCode, ParsedText)>,
}

impl Template {
    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    pub fn has_text(&self, language: &LanguageCode) -> bool {
        self.texts.iter().any(|(code, _)| code == language)
    }

    pub fn text_for(&self, language: &LanguageCode) -> Option<&ParsedText> {
        self.texts
            .iter()
            .find(|(code, _)| code == language)
            .map(|(_, text)| text)
    }

    /// First language with any translation
    pub fn first_language(&self) -> Option<&LanguageCode> {
        self.texts.first().map(|(code, _)| code)
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageCode> {
        self.texts.iter().map(|(code, _)| code)
    }

    pub fn texts(&self) -> impl Iterator<Item = (&LanguageCode, &ParsedText)> {
        self.texts.iter().map(|(code, text)| (code, text))
    }

    pub fn is_per_team(&self) -> bool {
        self.flags.contains(TemplateFlags::PER_TEAM)
    }

    /// Markup dialect used when rendering this template
    pub fn markup(&self) -> Markup {
        if self.flags.contains(TemplateFlags::NO_COLOR) {
            Markup::Plain
        } else if self.flags.contains(TemplateFlags::WIDGET_MARKUP) {
            Markup::WidgetRichText
        } else {
            Markup::EngineRichText
        }
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id,
            key: self.key.clone(),
            arity: self.arity(),
            flags: self.flags.names(),
            has_metadata: self.has_metadata,
            sign_key: self.sign_key.clone(),
            description: self.description.clone(),
            languages: self.languages().map(|code| code.to_string()).collect(),
            slots: self
                .slots
                .iter()
                .map(|slot| SlotSummary {
                    value_type: slot.value_type.clone(),
                    formatters: slot.formatters.iter().map(|f| f.name().to_string()).collect(),
                })
                .collect(),
        }
    }
}

/// Serializable view of a template for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub key: String,
    pub arity: usize,
    pub flags: Vec<&'static str>,
    pub has_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub languages: Vec<String>,
    pub slots: Vec<SlotSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSummary {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    pub formatters: Vec<String>,
}
