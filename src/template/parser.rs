//! Single-pass scanner for the template mini-language.
//!
//! | Construct | Meaning |
//! |-----------|---------|
//! | `{0}` | positional argument |
//! | `{{`, `}}` | literal braces |
//! | `c$key$` | open a palette color (must not follow a letter or digit) |
//! | `</color>` after `c$key$` | close the color span (closed at the end of the text when missing) |
//! | `${p:0:text}` | `text` pluralized unless argument 0 is exactly one |
//! | `${p:0:text!}` | `text` pluralized only when argument 0 is exactly one |

use serde::Serialize;
use thiserror::Error;

const COLOR_CLOSE: &str = "</color>";
const PLURAL_OPEN: &str = "${p:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("Invalid placeholder '{text}' at byte {position}")]
    InvalidPlaceholder { position: usize, text: String },

    #[error("Unmatched '}}' at byte {0}")]
    UnmatchedBrace(usize),

    #[error("Placeholder {{{index}}} exceeds template arity {arity}")]
    IndexOutOfRange { index: usize, arity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Literal { text: String },
    Arg { index: usize },
    ColorOpen { key: String },
    ColorClose,
    Plural {
        arg: usize,
        text: String,
        negated: bool,
    },
}

/// A template text split into segments, keeping the raw source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedText {
    raw: String,
    segments: Vec<Segment>,
}

impl ParsedText {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        Ok(Self {
            raw: raw.to_string(),
            segments: Scanner::new(raw).run()?,
        })
    }

    /// Treat the whole text as a literal; used when parsing fails
    pub fn literal(raw: &str) -> Self {
        let segments = if raw.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal {
                text: raw.to_string(),
            }]
        };
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Highest argument index referenced by a placeholder or plural span
    pub fn max_arg(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Arg { index } => Some(*index),
                Segment::Plural { arg, .. } => Some(*arg),
                _ => None,
            })
            .max()
    }

    /// Check every referenced index against the declared arity
    pub fn validate(&self, arity: usize) -> Result<(), ParseError> {
        match self.max_arg() {
            Some(index) if index >= arity => Err(ParseError::IndexOutOfRange { index, arity }),
            _ => Ok(()),
        }
    }

    pub fn has_color(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::ColorOpen { .. }))
    }
}

struct Scanner<'a> {
    raw: &'a str,
    bytes: &'a [u8],
    pos: usize,
    run_start: usize,
    literal: String,
    open_colors: usize,
    segments: Vec<Segment>,
}

impl<'a> Scanner<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            bytes: raw.as_bytes(),
            pos: 0,
            run_start: 0,
            literal: String::new(),
            open_colors: 0,
            segments: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Segment>, ParseError> {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'{' => self.brace_open()?,
                b'}' => self.brace_close()?,
                b'$' if self.raw[self.pos..].starts_with(PLURAL_OPEN) => self.plural()?,
                b'c' if self.at_word_boundary() && self.peek(1) == Some(b'$') => self.color_open(),
                b'<' if self.open_colors > 0 && self.raw[self.pos..].starts_with(COLOR_CLOSE) => {
                    self.take_run();
                    self.emit(Segment::ColorClose);
                    self.open_colors -= 1;
                    self.skip(COLOR_CLOSE.len());
                }
                _ => self.pos += 1,
            }
        }

        self.take_run();
        // Unclosed color spans end with the text
        for _ in 0..self.open_colors {
            self.emit(Segment::ColorClose);
        }
        self.flush();
        Ok(self.segments)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn at_word_boundary(&self) -> bool {
        self.pos == 0 || !self.bytes[self.pos - 1].is_ascii_alphanumeric()
    }

    /// Append the pending literal run to the literal buffer
    fn take_run(&mut self) {
        self.literal.push_str(&self.raw[self.run_start..self.pos]);
    }

    fn skip(&mut self, len: usize) {
        self.pos += len;
        self.run_start = self.pos;
    }

    fn flush(&mut self) {
        if !self.literal.is_empty() {
            let text = std::mem::take(&mut self.literal);
            self.segments.push(Segment::Literal { text });
        }
    }

    fn emit(&mut self, segment: Segment) {
        self.flush();
        self.segments.push(segment);
    }

    fn brace_open(&mut self) -> Result<(), ParseError> {
        self.take_run();
        if self.peek(1) == Some(b'{') {
            self.literal.push('{');
            self.skip(2);
            return Ok(());
        }

        let raw = self.raw;
        let start = self.pos;
        let close = raw[start + 1..]
            .find('}')
            .map(|offset| start + 1 + offset)
            .ok_or(ParseError::Unterminated(start))?;

        let index = parse_index(&raw[start + 1..close]).ok_or_else(|| {
            ParseError::InvalidPlaceholder {
                position: start,
                text: raw[start..=close].to_string(),
            }
        })?;

        self.emit(Segment::Arg { index });
        self.skip(close + 1 - start);
        Ok(())
    }

    fn brace_close(&mut self) -> Result<(), ParseError> {
        if self.peek(1) != Some(b'}') {
            return Err(ParseError::UnmatchedBrace(self.pos));
        }
        self.take_run();
        self.literal.push('}');
        self.skip(2);
        Ok(())
    }

    fn plural(&mut self) -> Result<(), ParseError> {
        let raw = self.raw;
        let start = self.pos;
        let body_start = start + PLURAL_OPEN.len();
        let close = raw[body_start..]
            .find('}')
            .map(|offset| body_start + offset)
            .ok_or(ParseError::Unterminated(start))?;

        let invalid = || ParseError::InvalidPlaceholder {
            position: start,
            text: raw[start..=close].to_string(),
        };

        let (index, text) = raw[body_start..close]
            .split_once(':')
            .ok_or_else(invalid)?;
        let arg = parse_index(index).ok_or_else(invalid)?;

        let (text, negated) = match text.strip_suffix('!') {
            Some(text) => (text, true),
            None => (text, false),
        };

        self.take_run();
        self.emit(Segment::Plural {
            arg,
            text: text.to_string(),
            negated,
        });
        self.skip(close + 1 - start);
        Ok(())
    }

    fn color_open(&mut self) {
        let key_start = self.pos + 2;
        let key_end = key_start
            + self.bytes[key_start..]
                .iter()
                .take_while(|b| is_key_byte(**b))
                .count();

        if key_end == key_start || self.bytes.get(key_end) != Some(&b'$') {
            self.pos += 1;
            return;
        }

        let key = self.raw[key_start..key_end].to_string();
        self.take_run();
        self.emit(Segment::ColorOpen { key });
        self.open_colors += 1;
        self.skip(key_end + 1 - self.pos);
    }
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-'
}

fn parse_index(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
