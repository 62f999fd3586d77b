//! Colors, rich-text markup dialects and the palette-backed color key resolver.
//!
//! Templates reference colors symbolically (`c$attack$`). The host owns the
//! actual palette and can swap it at any time; the [`ColorResolver`] only
//! consumes a `(key) -> Color` lookup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::RenderMetrics;

/// Error returned when a hex color string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid color '{0}': expected #rrggbb or #rrggbbaa")]
pub struct ColorParseError(pub String);

/// An RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Lower-case hex without the leading `#`; alpha is only emitted when not opaque
    pub fn to_hex(&self) -> String {
        if self.a == 0xff {
            format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColorParseError(s.to_string()))
        };

        let a = if hex.len() == 8 { channel(6)? } else { 0xff };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        format!("#{}", color.to_hex())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Rich-text dialect used when splicing colors into rendered text.
///
/// Chosen once per render from the template flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Markup {
    /// Engine-native rich text: `<#rrggbb>text</color>`
    #[default]
    EngineRichText,
    /// Widget rich text: `<color=#rrggbb>text</color>`
    WidgetRichText,
    /// No color envelopes at all (console mirrors, logs)
    Plain,
}

impl Markup {
    pub fn open(&self, color: Color) -> String {
        match self {
            Markup::EngineRichText => format!("<#{}>", color.to_hex()),
            Markup::WidgetRichText => format!("<color=#{}>", color.to_hex()),
            Markup::Plain => String::new(),
        }
    }

    pub fn close(&self) -> &'static str {
        match self {
            Markup::Plain => "",
            _ => "</color>",
        }
    }

    /// Wrap `text` in a color envelope for this dialect
    pub fn wrap(&self, text: &str, color: Color) -> String {
        match self {
            Markup::Plain => text.to_string(),
            _ => format!("{}{}{}", self.open(color), text, self.close()),
        }
    }
}

/// Host-supplied lookup from symbolic color key to color
pub trait PaletteProvider: Send + Sync {
    fn color(&self, key: &str) -> Option<Color>;
}

impl<F> PaletteProvider for F
where
    F: Fn(&str) -> Option<Color> + Send + Sync,
{
    fn color(&self, key: &str) -> Option<Color> {
        self(key)
    }
}

/// Hot-reloadable palette.
///
/// The whole map is swapped on [`Palette::replace`]; lookups never block.
pub struct Palette {
    colors: ArcSwap<HashMap<String, Color>>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl Palette {
    pub fn new(colors: HashMap<String, Color>) -> Self {
        Self {
            colors: ArcSwap::from_pointee(normalize(colors)),
        }
    }

    /// Replace the whole palette, returning the number of keys now loaded
    pub fn replace(&self, colors: HashMap<String, Color>) -> usize {
        let colors = normalize(colors);
        let count = colors.len();
        self.colors.store(Arc::new(colors));
        tracing::info!(colors = count, "Palette replaced");
        count
    }

    pub fn len(&self) -> usize {
        self.colors.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(colors: HashMap<String, Color>) -> HashMap<String, Color> {
    colors
        .into_iter()
        .map(|(key, color)| (key.to_ascii_lowercase(), color))
        .collect()
}

impl PaletteProvider for Palette {
    fn color(&self, key: &str) -> Option<Color> {
        let colors = self.colors.load();
        colors
            .get(key)
            .or_else(|| colors.get(&key.to_ascii_lowercase()))
            .copied()
    }
}

/// Resolves symbolic color keys, falling back to a default color.
///
/// Unknown keys are warned about once per unique key until
/// [`ColorResolver::reset_warnings`] starts a new session.
pub struct ColorResolver {
    provider: Arc<dyn PaletteProvider>,
    default_color: Color,
    warned: DashSet<String>,
}

impl ColorResolver {
    pub fn new(provider: Arc<dyn PaletteProvider>, default_color: Color) -> Self {
        Self {
            provider,
            default_color,
            warned: DashSet::new(),
        }
    }

    pub fn resolve(&self, key: &str) -> Color {
        if let Some(color) = self.provider.color(key) {
            return color;
        }

        if self.warned.insert(key.to_string()) {
            RenderMetrics::record_unknown_color_key();
            tracing::warn!(
                color_key = %key,
                default = %self.default_color,
                "Unknown color key, using default color"
            );
        }

        self.default_color
    }

    pub fn default_color(&self) -> Color {
        self.default_color
    }

    /// Number of distinct unknown keys seen this session
    pub fn unknown_key_count(&self) -> usize {
        self.warned.len()
    }

    pub fn reset_warnings(&self) {
        self.warned.clear();
    }
}
