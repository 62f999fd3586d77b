//! Formatter registry and per-argument formatting.
//!
//! Each template slot carries a chain of [`FormatterRef`]s applied in order.
//! A token is resolved against formatters registered for the argument's
//! value type first, then against generic formatters. Tokens nobody knows
//! fall through to the value itself (objects may answer custom tokens), to
//! standard numeric or timestamp formats, and finally to the current text
//! with a one-time warning.
//!
//! # Built-in tokens
//!
//! | Token | Effect |
//! |-------|--------|
//! | `upper`, `lower`, `proper` | case transforms |
//! | `plural`, `plural:i` | plural form (only if argument `i` is not exactly one) |
//! | `tlong`, `tlonga` | "3 minutes and 4 seconds", "3m 4s" |
//! | `tshort1`, `tshort2` | `mm:ss`, `hh:mm:ss` |
//! | `rarity` | wrap in the value's rarity color |

mod number;
mod time;
mod value;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use thiserror::Error;

use crate::audience::{RecipientId, TeamTag};
use crate::color::Markup;
use crate::language::LanguageInfo;
use crate::metrics::RenderMetrics;
use crate::template::Pluralizer;

pub use number::{format_number, format_timestamp, is_numeric_format};
pub use value::{Arg, Args, Formattable};

/// Everything a formatter may consult besides the value itself
#[derive(Clone, Copy)]
pub struct FormatContext<'a> {
    pub language: &'a LanguageInfo,
    /// All arguments of the render, for cross-slot tokens like `plural:i`
    pub args: &'a [Arg],
    pub markup: Markup,
    pub team: Option<TeamTag>,
    pub recipient: Option<RecipientId>,
    pub pluralizer: &'a Pluralizer,
}

impl fmt::Debug for FormatContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatContext")
            .field("language", &self.language.code)
            .field("args", &self.args.len())
            .field("markup", &self.markup)
            .field("team", &self.team)
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Input handed to a formatter function
#[derive(Debug, Clone, Copy)]
pub struct FormatInput<'a> {
    /// The original argument
    pub value: &'a Arg,
    /// Text produced by the previous formatters in the chain
    pub text: &'a str,
    /// Token parameter after `:` (`"2"` for `plural:2`)
    pub param: Option<&'a str>,
}

pub type FormatterFn =
    Arc<dyn Fn(&FormatInput<'_>, &FormatContext<'_>) -> Result<String, FormatError> + Send + Sync>;

/// Formatting failure; surfaced as a render error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Token '{token}' cannot format a {value_type} value")]
    UnsupportedValue {
        token: String,
        value_type: &'static str,
    },

    #[error("Invalid format token '{0}'")]
    InvalidToken(String),

    #[error("Token '{token}' references argument {index} but only {len} were supplied")]
    ArgumentOutOfRange {
        token: String,
        index: usize,
        len: usize,
    },

    #[error("Formatter '{formatter}' failed: {message}")]
    Failed { formatter: String, message: String },
}

/// One step of a slot's formatter chain
#[derive(Clone)]
pub enum FormatterRef {
    /// Resolved through the [`FormatterRegistry`] at render time
    Token(String),
    /// Caller-supplied delegate bound directly to the slot
    Custom { name: String, func: FormatterFn },
}

impl FormatterRef {
    pub fn token(token: impl Into<String>) -> Self {
        FormatterRef::Token(token.into())
    }

    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&FormatInput<'_>, &FormatContext<'_>) -> Result<String, FormatError>
            + Send
            + Sync
            + 'static,
    {
        FormatterRef::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormatterRef::Token(token) => token,
            FormatterRef::Custom { name, .. } => name,
        }
    }

    /// Argument index referenced by a `plural:i` token
    pub fn plural_reference(&self) -> Option<&str> {
        match self {
            FormatterRef::Token(token) => {
                let (name, param) = token.split_once(':')?;
                name.eq_ignore_ascii_case("plural").then_some(param)
            }
            FormatterRef::Custom { .. } => None,
        }
    }
}

impl fmt::Debug for FormatterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatterRef::Token(token) => f.debug_tuple("Token").field(token).finish(),
            FormatterRef::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}

impl From<&str> for FormatterRef {
    fn from(token: &str) -> Self {
        FormatterRef::Token(token.to_string())
    }
}

impl From<String> for FormatterRef {
    fn from(token: String) -> Self {
        FormatterRef::Token(token)
    }
}

/// Maps `(value type, token)` to formatter functions
pub struct FormatterRegistry {
    typed: HashMap<(String, String), FormatterFn>,
    generic: HashMap<String, FormatterFn>,
    warned: DashSet<(String, String)>,
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("typed", &self.typed.len())
            .field("generic", &self.generic.len())
            .finish()
    }
}

impl FormatterRegistry {
    /// An empty registry without built-in tokens
    pub fn new() -> Self {
        Self {
            typed: HashMap::new(),
            generic: HashMap::new(),
            warned: DashSet::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("upper", |input, _| Ok(input.text.to_uppercase()));
        registry.register("lower", |input, _| Ok(input.text.to_lowercase()));
        registry.register("proper", |input, _| Ok(proper_case(input.text)));
        registry.register("plural", plural);
        registry.register("tlong", |input, _| seconds(input, "tlong").map(time::long));
        registry.register("tlonga", |input, _| {
            seconds(input, "tlonga").map(time::long_abbreviated)
        });
        registry.register("tshort1", |input, _| {
            seconds(input, "tshort1").map(time::minutes_seconds)
        });
        registry.register("tshort2", |input, _| {
            seconds(input, "tshort2").map(time::hours_minutes_seconds)
        });
        registry.register("rarity", rarity);
        registry
    }

    /// Register a formatter for every value type
    pub fn register<F>(&mut self, token: &str, func: F)
    where
        F: Fn(&FormatInput<'_>, &FormatContext<'_>) -> Result<String, FormatError>
            + Send
            + Sync
            + 'static,
    {
        self.generic.insert(token.to_ascii_lowercase(), Arc::new(func));
    }

    /// Register a formatter for one value type; takes precedence over generic ones
    pub fn register_typed<F>(&mut self, value_type: &str, token: &str, func: F)
    where
        F: Fn(&FormatInput<'_>, &FormatContext<'_>) -> Result<String, FormatError>
            + Send
            + Sync
            + 'static,
    {
        self.typed.insert(
            (value_type.to_ascii_lowercase(), token.to_ascii_lowercase()),
            Arc::new(func),
        );
    }

    /// Look up the formatter for a token; the part after `:` is a parameter
    pub fn resolve(&self, value_type: &str, token: &str) -> Option<FormatterFn> {
        let name = token.split_once(':').map_or(token, |(name, _)| name);
        let name = name.to_ascii_lowercase();
        self.typed
            .get(&(value_type.to_ascii_lowercase(), name.clone()))
            .or_else(|| self.generic.get(&name))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.typed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply one formatter of a chain to the current text
    pub fn apply(
        &self,
        formatter: &FormatterRef,
        value: &Arg,
        text: &str,
        ctx: &FormatContext<'_>,
    ) -> Result<String, FormatError> {
        match formatter {
            FormatterRef::Custom { func, .. } => func(
                &FormatInput {
                    value,
                    text,
                    param: None,
                },
                ctx,
            ),
            FormatterRef::Token(token) => self.apply_token(token, value, text, ctx),
        }
    }

    fn apply_token(
        &self,
        token: &str,
        value: &Arg,
        text: &str,
        ctx: &FormatContext<'_>,
    ) -> Result<String, FormatError> {
        if let Some(func) = self.resolve(value.value_type(), token) {
            let param = token.split_once(':').map(|(_, param)| param);
            return func(&FormatInput { value, text, param }, ctx);
        }

        if let Arg::Object(object) = value {
            if let Some(out) = object.format_token(token, ctx) {
                return Ok(out);
            }
        }

        if let Arg::Timestamp(ts) = value {
            if token.contains('%') {
                return format_timestamp(ts, token)
                    .ok_or_else(|| FormatError::InvalidToken(token.to_string()));
            }
        }

        if is_numeric_format(token) {
            if let Some(n) = numeric(value) {
                return format_number(n, token, ctx.language).ok_or_else(|| {
                    FormatError::UnsupportedValue {
                        token: token.to_string(),
                        value_type: value.value_type(),
                    }
                });
            }
        }

        self.warn_unknown(value.value_type(), token);
        Ok(text.to_string())
    }

    fn warn_unknown(&self, value_type: &str, token: &str) {
        if self
            .warned
            .insert((value_type.to_string(), token.to_string()))
        {
            RenderMetrics::record_unknown_token();
            tracing::warn!(
                value_type = %value_type,
                token = %token,
                "Unknown format token, using default text"
            );
        }
    }

    /// Forget which unknown tokens were already reported
    pub fn reset_warnings(&self) {
        self.warned.clear();
    }
}

fn numeric(value: &Arg) -> Option<f64> {
    match value {
        Arg::Int(_) | Arg::Float(_) | Arg::Object(_) => value.as_number(),
        _ => None,
    }
}

fn proper_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = c.is_whitespace() || c == '-' || c == '_';
        }
    }
    out
}

fn plural(input: &FormatInput<'_>, ctx: &FormatContext<'_>) -> Result<String, FormatError> {
    if let Some(param) = input.param {
        let index: usize = param
            .trim()
            .parse()
            .map_err(|_| FormatError::InvalidToken(format!("plural:{}", param)))?;
        let reference = ctx
            .args
            .get(index)
            .ok_or_else(|| FormatError::ArgumentOutOfRange {
                token: format!("plural:{}", param),
                index,
                len: ctx.args.len(),
            })?;
        if reference.is_exactly_one() {
            return Ok(input.text.to_string());
        }
    }

    if let Arg::Object(object) = input.value {
        if let Some(plural) = object.plural(ctx) {
            return Ok(plural);
        }
    }

    Ok(ctx.pluralizer.pluralize(&ctx.language.code, input.text))
}

fn seconds(input: &FormatInput<'_>, token: &str) -> Result<i64, FormatError> {
    let seconds = match input.value {
        Arg::Duration(d) => Some(d.num_seconds()),
        Arg::Int(v) => Some(*v),
        Arg::Float(v) => Some(v.round() as i64),
        other => other.as_number().map(|n| n.round() as i64),
    };
    seconds.ok_or_else(|| FormatError::UnsupportedValue {
        token: token.to_string(),
        value_type: input.value.value_type(),
    })
}

fn rarity(input: &FormatInput<'_>, ctx: &FormatContext<'_>) -> Result<String, FormatError> {
    let color = match input.value {
        Arg::Object(object) => object.rarity_color(),
        Arg::Color(color) => Some(*color),
        _ => None,
    };
    let color = color.ok_or_else(|| FormatError::UnsupportedValue {
        token: "rarity".to_string(),
        value_type: input.value.value_type(),
    })?;
    Ok(ctx.markup.wrap(input.text, color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use chrono::Duration;

    #[derive(Debug)]
    struct Vehicle;

    impl Formattable for Vehicle {
        fn type_name(&self) -> &'static str {
            "vehicle"
        }

        fn display(&self, _ctx: &FormatContext<'_>) -> String {
            "Humvee".to_string()
        }

        fn plural(&self, _ctx: &FormatContext<'_>) -> Option<String> {
            Some("Humvees".to_string())
        }

        fn rarity_color(&self) -> Option<Color> {
            Some(Color::rgb(0x33, 0x66, 0xff))
        }

        fn format_token(&self, token: &str, _ctx: &FormatContext<'_>) -> Option<String> {
            (token == "seats").then(|| "4".to_string())
        }
    }

    struct Fixture {
        language: LanguageInfo,
        pluralizer: Pluralizer,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                language: LanguageInfo::new("en-us"),
                pluralizer: Pluralizer::new(),
            }
        }

        fn ctx<'a>(&'a self, args: &'a [Arg]) -> FormatContext<'a> {
            FormatContext {
                language: &self.language,
                args,
                markup: Markup::EngineRichText,
                team: None,
                recipient: None,
                pluralizer: &self.pluralizer,
            }
        }
    }

    fn run(registry: &FormatterRegistry, token: &str, value: &Arg, args: &[Arg]) -> Result<String, FormatError> {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(args);
        let text = value.display(&ctx);
        registry.apply(&FormatterRef::token(token), value, &text, &ctx)
    }

    #[test]
    fn test_case_tokens_are_idempotent() {
        let registry = FormatterRegistry::with_builtins();
        let value = Arg::from("squad leader-kit");

        for token in ["upper", "lower", "proper"] {
            let once = run(&registry, token, &value, &[]).unwrap();
            let twice = run(&registry, token, &Arg::from(once.clone()), &[]).unwrap();
            assert_eq!(once, twice, "{} is not idempotent", token);
        }
        assert_eq!(run(&registry, "proper", &value, &[]).unwrap(), "Squad Leader-Kit");
    }

    #[test]
    fn test_plural_with_reference() {
        let registry = FormatterRegistry::with_builtins();
        let value = Arg::from("tank");

        let args = [Arg::from("tank"), Arg::from(1)];
        assert_eq!(run(&registry, "plural:1", &value, &args).unwrap(), "tank");

        let args = [Arg::from("tank"), Arg::from(3)];
        assert_eq!(run(&registry, "plural:1", &value, &args).unwrap(), "tanks");

        let err = run(&registry, "plural:5", &value, &args).unwrap_err();
        assert!(matches!(err, FormatError::ArgumentOutOfRange { index: 5, len: 2, .. }));
    }

    #[test]
    fn test_object_plural_and_rarity() {
        let registry = FormatterRegistry::with_builtins();
        let value = Arg::object(Vehicle);

        assert_eq!(run(&registry, "plural", &value, &[]).unwrap(), "Humvees");
        assert_eq!(run(&registry, "rarity", &value, &[]).unwrap(), "<#3366ff>Humvee</color>");
        assert_eq!(run(&registry, "seats", &value, &[]).unwrap(), "4");
        assert!(run(&registry, "rarity", &Arg::from(3), &[]).is_err());
    }

    #[test]
    fn test_time_tokens() {
        let registry = FormatterRegistry::with_builtins();
        assert_eq!(run(&registry, "tlong", &Arg::from(184), &[]).unwrap(), "3 minutes and 4 seconds");
        assert_eq!(run(&registry, "tlonga", &Arg::from(Duration::seconds(184)), &[]).unwrap(), "3m 4s");
        assert_eq!(run(&registry, "tshort1", &Arg::from(184.2), &[]).unwrap(), "03:04");
        assert_eq!(run(&registry, "tshort2", &Arg::from(3725), &[]).unwrap(), "01:02:05");
        assert!(run(&registry, "tlong", &Arg::from(true), &[]).is_err());
    }

    #[test]
    fn test_numeric_fallthrough() {
        let registry = FormatterRegistry::with_builtins();
        assert_eq!(run(&registry, "N0", &Arg::from(12345), &[]).unwrap(), "12,345");
        assert_eq!(run(&registry, "0.##", &Arg::from(2.5), &[]).unwrap(), "2.5");
        assert!(run(&registry, "D2", &Arg::from(2.5), &[]).is_err());
    }

    #[test]
    fn test_unknown_token_keeps_text_and_warns_once() {
        let registry = FormatterRegistry::with_builtins();
        let value = Arg::from("M4A1");

        assert_eq!(run(&registry, "sparkle", &value, &[]).unwrap(), "M4A1");
        assert_eq!(run(&registry, "sparkle", &value, &[]).unwrap(), "M4A1");
        assert_eq!(registry.warned.len(), 1);

        registry.reset_warnings();
        assert!(registry.warned.is_empty());
    }

    #[test]
    fn test_typed_registration_wins() {
        let mut registry = FormatterRegistry::with_builtins();
        registry.register_typed("vehicle", "upper", |_, _| Ok("VEHICLE".to_string()));

        assert_eq!(run(&registry, "upper", &Arg::object(Vehicle), &[]).unwrap(), "VEHICLE");
        assert_eq!(run(&registry, "upper", &Arg::from("jeep"), &[]).unwrap(), "JEEP");
    }

    #[test]
    fn test_custom_formatter_ref() {
        let registry = FormatterRegistry::new();
        let fixture = Fixture::new();
        let ctx = fixture.ctx(&[]);
        let formatter = FormatterRef::custom("brackets", |input, _| Ok(format!("[{}]", input.text)));

        assert_eq!(formatter.name(), "brackets");
        assert_eq!(registry.apply(&formatter, &Arg::from(1), "1", &ctx).unwrap(), "[1]");
        assert_eq!(FormatterRef::token("plural:2").plural_reference(), Some("2"));
        assert_eq!(FormatterRef::token("upper").plural_reference(), None);
    }

    #[test]
    fn test_timestamp_pattern() {
        use chrono::TimeZone;
        let registry = FormatterRegistry::with_builtins();
        let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(run(&registry, "%H:%M", &Arg::from(ts), &[]).unwrap(), "03:04");
    }
}
