//! Standard numeric and timestamp format strings.
//!
//! Supported numeric tokens:
//!
//! | Token | Meaning | `1234.5` (en) |
//! |-------|---------|---------------|
//! | `N<d>` | grouped, `d` decimals (default 2) | `1,234.50` |
//! | `F<d>` | fixed, `d` decimals (default 2) | `1234.50` |
//! | `P<d>` | percent, `d` decimals (default 2) | `123,450.00%` |
//! | `D<d>` | integer, zero-padded to `d` digits | n/a |
//! | `X<d>` | hexadecimal integer | n/a |
//! | custom | `0`, `#`, `.`, `,`, `%` pattern, e.g. `0.##`, `#,##0` | |
//!
//! Timestamps accept strftime patterns (`%H:%M`).

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::language::LanguageInfo;

/// Whether `token` looks like a numeric format string
pub fn is_numeric_format(token: &str) -> bool {
    is_standard(token) || is_custom(token)
}

fn is_standard(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if "NnFfPpDdXx".contains(c) => {
            let rest = chars.as_str();
            rest.len() <= 2 && rest.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn is_custom(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| "0#.,%".contains(c))
        && token.chars().any(|c| c == '0' || c == '#')
}

/// Format a number; `None` when the token does not apply to the value
/// (for example `D2` on a fractional value).
pub fn format_number(value: f64, token: &str, language: &LanguageInfo) -> Option<String> {
    if !value.is_finite() {
        return Some(value.to_string());
    }

    if is_standard(token) {
        let kind = token.chars().next()?;
        let precision: Option<usize> = token[1..].parse().ok();
        return match kind.to_ascii_uppercase() {
            'N' => Some(fixed(value, precision.unwrap_or(2), true, language)),
            'F' => Some(fixed(value, precision.unwrap_or(2), false, language)),
            'P' => Some(format!(
                "{}%",
                fixed(value * 100.0, precision.unwrap_or(2), true, language)
            )),
            'D' => integer(value).map(|v| {
                let digits = format!("{:0width$}", v.unsigned_abs(), width = precision.unwrap_or(0));
                if v < 0 {
                    format!("-{}", digits)
                } else {
                    digits
                }
            }),
            'X' => integer(value).filter(|v| *v >= 0).map(|v| {
                let width = precision.unwrap_or(0);
                if kind == 'x' {
                    format!("{:0width$x}", v, width = width)
                } else {
                    format!("{:0width$X}", v, width = width)
                }
            }),
            _ => None,
        };
    }

    if is_custom(token) {
        return Some(custom(value, token, language));
    }

    None
}

/// Format a timestamp with a strftime pattern; `None` for invalid patterns
pub fn format_timestamp(value: &DateTime<Utc>, pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    Some(value.format_with_items(items.into_iter()).to_string())
}

fn integer(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() < 9.0e15).then_some(value as i64)
}

fn fixed(value: f64, decimals: usize, grouped: bool, language: &LanguageInfo) -> String {
    let rendered = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, ""));
    assemble(value, int_part, frac_part, grouped, language)
}

fn custom(value: f64, pattern: &str, language: &LanguageInfo) -> String {
    let percent = pattern.contains('%');
    let value = if percent { value * 100.0 } else { value };
    let (int_pattern, frac_pattern) = pattern.split_once('.').unwrap_or((pattern, ""));

    let min_frac = frac_pattern.chars().filter(|c| *c == '0').count();
    let max_frac = frac_pattern
        .chars()
        .filter(|c| *c == '0' || *c == '#')
        .count();
    let min_int = int_pattern.chars().filter(|c| *c == '0').count();
    let grouped = int_pattern.contains(',');

    let rendered = format!("{:.*}", max_frac, value.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, ""));

    let mut frac = frac_part.to_string();
    while frac.len() > min_frac && frac.ends_with('0') {
        frac.pop();
    }

    let mut int = int_part.to_string();
    if min_int == 0 && int == "0" && !frac.is_empty() {
        int.clear();
    }
    while int.len() < min_int {
        int.insert(0, '0');
    }

    let mut out = assemble(value, &int, &frac, grouped, language);
    if out.is_empty() || out == "-" {
        out = "0".to_string();
    }
    if percent {
        out.push('%');
    }
    out
}

fn assemble(value: f64, int_part: &str, frac_part: &str, grouped: bool, language: &LanguageInfo) -> String {
    let int_part = if grouped {
        group(int_part, language.group_separator)
    } else {
        int_part.to_string()
    };

    let is_zero = int_part.chars().chain(frac_part.chars()).all(|c| !c.is_ascii_digit() || c == '0');
    let mut out = String::with_capacity(int_part.len() + frac_part.len() + 2);
    if value < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&int_part);
    if !frac_part.is_empty() {
        out.push(language.decimal_separator);
        out.push_str(frac_part);
    }
    out
}

fn group(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}
