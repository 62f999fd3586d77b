//! Rendering parsed templates against arguments and a resolved language

use smallvec::SmallVec;
use thiserror::Error;

use crate::audience::{RecipientId, TeamTag};
use crate::color::{ColorResolver, Markup};
use crate::format::{Arg, FormatContext, FormatError, FormatterRegistry};
use crate::language::{LanguageSet, Resolution};
use crate::metrics::RenderMetrics;

use super::parser::Segment;
use super::plural::Pluralizer;
use super::types::Template;

/// Who a render is for; consulted by formatters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipientContext {
    pub recipient: Option<RecipientId>,
    pub team: Option<TeamTag>,
}

impl RecipientContext {
    pub fn new(recipient: RecipientId, team: Option<TeamTag>) -> Self {
        Self {
            recipient: Some(recipient),
            team,
        }
    }

    pub fn team(team: Option<TeamTag>) -> Self {
        Self {
            recipient: None,
            team,
        }
    }
}

/// Failure inside a single render; never escapes [`Renderer::render`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Template '{key}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("Argument {index} of '{key}' must be {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        index: usize,
        expected: String,
        actual: &'static str,
    },

    #[error("Formatting argument {index} of '{key}' failed: {source}")]
    Format {
        key: String,
        index: usize,
        #[source]
        source: FormatError,
    },
}

impl RenderError {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::ArgumentCount { .. } => "argument_count",
            RenderError::TypeMismatch { .. } => "type_mismatch",
            RenderError::Format { .. } => "format",
        }
    }
}

/// Renders templates; borrows everything it needs from the owning localizer
#[derive(Clone, Copy)]
pub struct Renderer<'a> {
    pub formatters: &'a FormatterRegistry,
    pub colors: &'a ColorResolver,
    pub languages: &'a LanguageSet,
    pub pluralizer: &'a Pluralizer,
}

impl<'a> Renderer<'a> {
    /// Render, absorbing every failure into a degraded `"key: arg, arg"` string
    pub fn render(
        &self,
        template: &Template,
        resolution: &Resolution,
        args: &[Arg],
        recipient: &RecipientContext,
    ) -> String {
        match self.try_render(template, resolution, args, recipient) {
            Ok(text) => text,
            Err(err) => {
                RenderMetrics::record_degraded(err.kind());
                tracing::warn!(
                    template = %template.key,
                    error = %err,
                    "Render failed, sending degraded text"
                );
                degraded(template, args)
            }
        }
    }

    pub fn try_render(
        &self,
        template: &Template,
        resolution: &Resolution,
        args: &[Arg],
        recipient: &RecipientContext,
    ) -> Result<String, RenderError> {
        if args.len() != template.arity() {
            return Err(RenderError::ArgumentCount {
                key: template.key.clone(),
                expected: template.arity(),
                actual: args.len(),
            });
        }

        for (index, (slot, arg)) in template.slots.iter().zip(args).enumerate() {
            if let Some(expected) = &slot.value_type {
                if !arg.is_type(expected) {
                    return Err(RenderError::TypeMismatch {
                        key: template.key.clone(),
                        index,
                        expected: expected.clone(),
                        actual: arg.value_type(),
                    });
                }
            }
        }

        let Some((code, text)) = resolution
            .language()
            .and_then(|code| template.text_for(code).map(|text| (code, text)))
            .or_else(|| template.texts.first().map(|(code, text)| (code, text)))
        else {
            RenderMetrics::record_key_only();
            return Ok(template.key.clone());
        };

        let markup = template.markup();
        let ctx = FormatContext {
            language: self.languages.info_or_default(code),
            args,
            markup,
            team: recipient.team,
            recipient: recipient.recipient,
            pluralizer: self.pluralizer,
        };

        let mut formatted: SmallVec<[Option<String>; 4]> = SmallVec::new();
        formatted.resize(args.len(), None);

        let mut out = String::with_capacity(text.raw().len() + 16 * args.len());
        for segment in text.segments() {
            match segment {
                Segment::Literal { text } => out.push_str(text),
                Segment::Arg { index } => {
                    let index = *index;
                    if formatted.get(index).is_none() {
                        return Err(self.count_error(template, args));
                    }
                    if formatted[index].is_none() {
                        formatted[index] = Some(self.format_slot(template, index, &ctx)?);
                    }
                    if let Some(value) = &formatted[index] {
                        out.push_str(value);
                    }
                }
                Segment::ColorOpen { key } => {
                    if markup != Markup::Plain {
                        out.push_str(&markup.open(self.colors.resolve(key)));
                    }
                }
                Segment::ColorClose => out.push_str(markup.close()),
                Segment::Plural { arg, text, negated } => {
                    let value = args
                        .get(*arg)
                        .ok_or_else(|| self.count_error(template, args))?;
                    if value.is_exactly_one() == *negated {
                        out.push_str(&self.pluralizer.pluralize(code, text));
                    } else {
                        out.push_str(text);
                    }
                }
            }
        }

        RenderMetrics::record_rendered();
        Ok(out)
    }

    fn format_slot(
        &self,
        template: &Template,
        index: usize,
        ctx: &FormatContext<'_>,
    ) -> Result<String, RenderError> {
        let value = &ctx.args[index];
        let mut text = value.display(ctx);
        if let Some(slot) = template.slots.get(index) {
            for formatter in &slot.formatters {
                text = self
                    .formatters
                    .apply(formatter, value, &text, ctx)
                    .map_err(|source| RenderError::Format {
                        key: template.key.clone(),
                        index,
                        source,
                    })?;
            }
        }
        Ok(text)
    }

    fn count_error(&self, template: &Template, args: &[Arg]) -> RenderError {
        RenderError::ArgumentCount {
            key: template.key.clone(),
            expected: template.arity(),
            actual: args.len(),
        }
    }
}

/// `"key: a, b"`, or just the key without arguments
pub fn degraded(template: &Template, args: &[Arg]) -> String {
    if args.is_empty() {
        return template.key.clone();
    }
    let raw: Vec<String> = args.iter().map(Arg::raw).collect();
    format!("{}: {}", template.key, raw.join(", "))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::args;
    use crate::color::{Color, PaletteProvider};
    use crate::language::{LanguageCode, LanguageInfo, LanguageResolver};
    use crate::template::{SlotSpec, TemplateDef, TemplateFlags, TemplateRegistry};

    struct Fixture {
        formatters: FormatterRegistry,
        colors: ColorResolver,
        languages: LanguageSet,
        registry: TemplateRegistry,
    }

    impl Fixture {
        fn new(defs: Vec<TemplateDef>) -> Self {
            let languages = LanguageSet::new(
                "en-us",
                vec![LanguageInfo::new("de-de").with_separators(',', '.')],
            );
            let provider: Arc<dyn PaletteProvider> =
                Arc::new(|key: &str| (key == "attack").then_some(Color::rgb(0xff, 0x44, 0x44)));
            let (registry, _) = TemplateRegistry::build(
                defs,
                Default::default(),
                Pluralizer::new(),
                languages.default_code(),
                1,
            );
            Self {
                formatters: FormatterRegistry::with_builtins(),
                colors: ColorResolver::new(provider, Color::WHITE),
                languages,
                registry,
            }
        }

        fn renderer(&self) -> Renderer<'_> {
            Renderer {
                formatters: &self.formatters,
                colors: &self.colors,
                languages: &self.languages,
                pluralizer: self.registry.pluralizer(),
            }
        }

        fn render(&self, key: &str, language: Option<&str>, args: &[Arg]) -> String {
            let template = self.registry.by_key(key).unwrap();
            let resolution = LanguageResolver::new(&self.languages).resolve(language, template);
            self.renderer()
                .render(template, &resolution, args, &RecipientContext::default())
        }
    }

    fn def(key: &str, text: &str, arity: usize) -> TemplateDef {
        let mut builder = TemplateDef::builder(key, text).flags(TemplateFlags::empty());
        for _ in 0..arity {
            builder = builder.arg();
        }
        builder.build()
    }

    #[test]
    fn test_placeholder_substitution() {
        let fixture = Fixture::new(vec![def("given", "Given you {0}x {1}.", 2)]);
        assert_eq!(fixture.render("given", None, &args![4, "M4A1"]), "Given you 4x M4A1.");
    }

    #[test]
    fn test_plural_spans() {
        let fixture = Fixture::new(vec![
            def("apple", "${p:0:apple}", 1),
            def("negated", "${p:0:apple!}", 1),
        ]);
        assert_eq!(fixture.render("apple", None, &args![1]), "apple");
        assert_eq!(fixture.render("apple", None, &args![3]), "apples");
        assert_eq!(fixture.render("negated", None, &args![1]), "apples");
        assert_eq!(fixture.render("negated", None, &args![3]), "apple");
    }

    #[test]
    fn test_color_markers_per_dialect() {
        let text = "c$attack$Attack</color> {0}";
        let fixture = Fixture::new(vec![
            def("engine", text, 1),
            TemplateDef::builder("widget", text)
                .arg()
                .flags(TemplateFlags::WIDGET_MARKUP)
                .build(),
            TemplateDef::builder("plain", text)
                .arg()
                .flags(TemplateFlags::NO_COLOR)
                .build(),
            def("unknown", "c$nope$x</color>", 0),
        ]);

        assert_eq!(fixture.render("engine", None, &args!["A"]), "<#ff4444>Attack</color> A");
        assert_eq!(
            fixture.render("widget", None, &args!["A"]),
            "<color=#ff4444>Attack</color> A"
        );
        assert_eq!(fixture.render("plain", None, &args!["A"]), "Attack A");
        assert_eq!(fixture.render("unknown", None, &[]), "<#ffffff>x</color>");
    }

    #[test]
    fn test_unclosed_color_span_is_closed() {
        let fixture = Fixture::new(vec![
            def("open", "Objective: c$attack${0}", 1),
            TemplateDef::builder("plain", "Objective: c$attack${0}")
                .arg()
                .flags(TemplateFlags::NO_COLOR)
                .build(),
        ]);
        assert_eq!(
            fixture.render("open", None, &args!["Bridge"]),
            "Objective: <#ff4444>Bridge</color>"
        );
        assert_eq!(fixture.render("plain", None, &args!["Bridge"]), "Objective: Bridge");
    }

    #[test]
    fn test_formatter_chain_runs_in_order() {
        let fixture = Fixture::new(vec![TemplateDef::builder("kills", "{0} {1}")
            .slot(SlotSpec::typed("number").format("N0"))
            .slot(SlotSpec::any().format("plural:0").format("upper"))
            .flags(TemplateFlags::empty())
            .build()]);

        assert_eq!(fixture.render("kills", None, &args![1234, "kill"]), "1,234 KILLS");
        assert_eq!(fixture.render("kills", None, &args![1, "kill"]), "1 KILL");
    }

    #[test]
    fn test_language_separators_apply() {
        let fixture = Fixture::new(vec![TemplateDef::builder("score", "{0}")
            .slot(SlotSpec::any().format("N1"))
            .flags(TemplateFlags::empty())
            .translation("de-de", "{0} Punkte")
            .build()]);

        assert_eq!(fixture.render("score", None, &args![1234.56]), "1,234.6");
        assert_eq!(fixture.render("score", Some("de-de"), &args![1234.56]), "1.234,6 Punkte");
    }

    #[test]
    fn test_errors_degrade() {
        let fixture = Fixture::new(vec![
            def("given", "Given you {0}x {1}.", 2),
            TemplateDef::builder("typed", "{0}")
                .slot(SlotSpec::typed("int"))
                .flags(TemplateFlags::empty())
                .build(),
            TemplateDef::builder("bad_format", "{0}")
                .slot(SlotSpec::any().format("tlong"))
                .flags(TemplateFlags::empty())
                .build(),
            def("no_args", "hello {0}", 1),
        ]);

        assert_eq!(fixture.render("given", None, &args![4]), "given: 4");
        assert_eq!(fixture.render("typed", None, &args!["x"]), "typed: x");
        assert_eq!(fixture.render("bad_format", None, &args![true]), "bad_format: true");
        assert_eq!(fixture.render("no_args", None, &[]), "no_args");
    }

    #[test]
    fn test_try_render_reports_error_kind() {
        let fixture = Fixture::new(vec![def("given", "{0}", 1)]);
        let template = fixture.registry.by_key("given").unwrap();
        let resolution = Resolution::KeyOnly;

        let err = fixture
            .renderer()
            .try_render(template, &resolution, &[], &RecipientContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), "argument_count");

        let text = fixture
            .renderer()
            .try_render(template, &resolution, &args![1], &RecipientContext::default())
            .unwrap();
        assert_eq!(text, "1");
    }

    #[test]
    fn test_key_only_without_texts() {
        let fixture = Fixture::new(vec![]);
        let template = Template {
            id: crate::template::TemplateId(0),
            key: "orphan".to_string(),
            flags: TemplateFlags::empty(),
            has_metadata: true,
            sign_key: None,
            description: None,
            slots: Vec::new(),
            texts: Vec::new(),
        };
        let text = fixture.renderer().render(
            &template,
            &Resolution::KeyOnly,
            &[],
            &RecipientContext::default(),
        );
        assert_eq!(text, "orphan");
        assert!(template.text_for(&LanguageCode::new("en-us")).is_none());
    }
}
