//! Variant-typed template arguments

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use smallvec::SmallVec;

use crate::color::Color;

use super::FormatContext;

/// Argument vector; most templates take four arguments or fewer
pub type Args = SmallVec<[Arg; 4]>;

/// A game object the engine can render without knowing its type.
///
/// `type_name` drives formatter dispatch: formatters registered for that
/// type name take precedence over generic ones.
pub trait Formattable: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Singular display text
    fn display(&self, ctx: &FormatContext<'_>) -> String;

    /// Declared plural display text, if the object has one
    fn plural(&self, _ctx: &FormatContext<'_>) -> Option<String> {
        None
    }

    /// Color used by the `rarity` token
    fn rarity_color(&self) -> Option<Color> {
        None
    }

    /// Numeric value used by plural checks, if the object has one
    fn as_number(&self) -> Option<f64> {
        None
    }

    /// Object-specific tokens not known to the formatter registry
    fn format_token(&self, _token: &str, _ctx: &FormatContext<'_>) -> Option<String> {
        None
    }
}

/// One template argument
#[derive(Debug, Clone)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Duration(Duration),
    Timestamp(DateTime<Utc>),
    Color(Color),
    Object(Arc<dyn Formattable>),
}

impl Arg {
    pub fn object<T: Formattable + 'static>(value: T) -> Self {
        Arg::Object(Arc::new(value))
    }

    /// Type name used for formatter dispatch and slot type checks
    pub fn value_type(&self) -> &'static str {
        match self {
            Arg::Int(_) => "int",
            Arg::Float(_) => "float",
            Arg::Text(_) => "text",
            Arg::Bool(_) => "bool",
            Arg::Duration(_) => "duration",
            Arg::Timestamp(_) => "timestamp",
            Arg::Color(_) => "color",
            Arg::Object(object) => object.type_name(),
        }
    }

    /// Whether this argument satisfies a declared slot type.
    ///
    /// `number` accepts both integers and floats.
    pub fn is_type(&self, declared: &str) -> bool {
        let actual = self.value_type();
        actual.eq_ignore_ascii_case(declared)
            || (declared.eq_ignore_ascii_case("number") && matches!(self, Arg::Int(_) | Arg::Float(_)))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Arg::Int(v) => Some(*v as f64),
            Arg::Float(v) => Some(*v),
            Arg::Text(s) => s.trim().parse().ok(),
            Arg::Duration(d) => Some(d.num_milliseconds() as f64 / 1000.0),
            Arg::Object(object) => object.as_number(),
            Arg::Bool(_) | Arg::Timestamp(_) | Arg::Color(_) => None,
        }
    }

    /// Singular when the numeric value is exactly one; non-numeric values never are
    pub fn is_exactly_one(&self) -> bool {
        self.as_number() == Some(1.0)
    }

    /// Default display text in the given context
    pub fn display(&self, ctx: &FormatContext<'_>) -> String {
        match self {
            Arg::Object(object) => object.display(ctx),
            Arg::Float(v) => {
                let text = format_float(*v);
                if ctx.language.decimal_separator == '.' {
                    text
                } else {
                    text.replace('.', &ctx.language.decimal_separator.to_string())
                }
            }
            other => other.raw(),
        }
    }

    /// Context-free text, used for degraded output
    pub fn raw(&self) -> String {
        match self {
            Arg::Int(v) => v.to_string(),
            Arg::Float(v) => format_float(*v),
            Arg::Text(s) => s.clone(),
            Arg::Bool(b) => b.to_string(),
            Arg::Duration(d) => format!("{}s", d.num_seconds()),
            Arg::Timestamp(t) => t.to_rfc3339(),
            Arg::Color(c) => c.to_string(),
            Arg::Object(object) => format!("{:?}", object),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int(i64::from(v))
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::Int(i64::from(v))
    }
}

impl From<usize> for Arg {
    fn from(v: usize) -> Self {
        Arg::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(f64::from(v))
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<Duration> for Arg {
    fn from(v: Duration) -> Self {
        Arg::Duration(v)
    }
}

impl From<DateTime<Utc>> for Arg {
    fn from(v: DateTime<Utc>) -> Self {
        Arg::Timestamp(v)
    }
}

impl From<Color> for Arg {
    fn from(v: Color) -> Self {
        Arg::Color(v)
    }
}

/// Build an [`Args`] vector from heterogeneous values
#[macro_export]
macro_rules! args {
    () => {
        $crate::format::Args::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut args = $crate::format::Args::new();
        $(args.push($crate::format::Arg::from($value));)+
        args
    }};
}
