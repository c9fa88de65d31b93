// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::error::Error as _;
use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Mutex;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::Error;
use crate::layout::Layout;
use crate::record::Record;

const DEFAULT_PATTERN: &str = "%d [%t] %-5p %c - %m%n";
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RENDER_FALLBACK: &str = "(format error)";

/// A layout that renders records through a chain of conversion specifiers.
///
/// Output format of the default pattern `%d [%t] %-5p %c - %m%n`:
///
/// ```text
/// 2024-08-11 22:44:57,172 [main] ERROR db.pool - connection refused
/// 2024-08-11 22:44:57,204 [main] INFO  db.pool - reconnected
/// ```
///
/// Supported conversions:
///
/// | specifier | output                                                    |
/// |-----------|-----------------------------------------------------------|
/// | `%d`      | record time; `%d{...}` takes a strftime format            |
/// | `%p`      | level name                                                |
/// | `%c`      | logger name                                               |
/// | `%m`      | message payload                                           |
/// | `%t`      | thread name                                               |
/// | `%x`      | context stack frames, space separated                     |
/// | `%X{key}` | property value, `(null)` when absent                      |
/// | `%e`      | error display with its source chain                       |
/// | `%n`      | newline                                                   |
/// | `%%`      | a literal percent sign                                    |
///
/// Every conversion accepts a format modifier `%[-]min[.max]`: `min` pads the
/// field with spaces up to a width (right justified, or left with `-`), and
/// `.max` truncates from the front, keeping the rightmost characters.
///
/// The date conversion caches its formatted text and only reformats when the
/// record time crosses a one-second boundary; the no-argument form appends the
/// milliseconds after a comma on every call.
#[derive(Debug)]
pub struct PatternLayout {
    pattern: String,
    chunks: Vec<Chunk>,
    header: Option<String>,
    footer: Option<String>,
}

impl PatternLayout {
    /// Parse a conversion pattern into a layout.
    ///
    /// # Errors
    ///
    /// Return an error if the pattern contains an unknown conversion, a
    /// malformed format modifier, an unterminated `{...}` argument, or a date
    /// format that strftime rejects.
    ///
    /// # Examples
    ///
    /// ```
    /// use logtree::layout::PatternLayout;
    ///
    /// let layout = PatternLayout::new("%d{%H:%M:%S} %-5p %m%n").unwrap();
    /// assert!(PatternLayout::new("%q").is_err());
    /// ```
    pub fn new(pattern: impl Into<String>) -> Result<PatternLayout, Error> {
        let pattern = pattern.into();
        let chunks = parse(&pattern)?;

        // surface malformed strftime arguments at construction time
        let probe = Timestamp::now();
        let mut scratch = String::new();
        for chunk in &chunks {
            if let Chunk::Field {
                conv: Conv::Date(format),
                ..
            } = chunk
            {
                format.render(probe, &mut scratch)?;
                scratch.clear();
            }
        }

        Ok(PatternLayout {
            pattern,
            chunks,
            header: None,
            footer: None,
        })
    }

    /// The source pattern this layout was parsed from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Set the header text emitted when an appender opens its sink.
    pub fn with_header(mut self, text: impl Into<String>) -> Self {
        self.header = Some(text.into());
        self
    }

    /// Set the footer text emitted when an appender closes its sink.
    pub fn with_footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }
}

impl Default for PatternLayout {
    fn default() -> Self {
        PatternLayout::new(DEFAULT_PATTERN).expect("default conversion pattern is well formed")
    }
}

impl Layout for PatternLayout {
    fn format(&self, record: &Record) -> Result<Vec<u8>, Error> {
        let mut out = String::with_capacity(128);
        let mut field = String::new();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Literal(text) => out.push_str(text),
                Chunk::Field { pad, conv } => {
                    if matches!(conv, Conv::Newline) {
                        out.push('\n');
                        continue;
                    }
                    field.clear();
                    if conv.render(record, &mut field).is_err() {
                        field.clear();
                        field.push_str(RENDER_FALLBACK);
                    }
                    apply_pad(pad, &field, &mut out);
                }
            }
        }
        Ok(out.into_bytes())
    }

    fn header(&self) -> Option<Vec<u8>> {
        self.header.as_ref().map(|text| {
            let mut bytes = text.clone().into_bytes();
            bytes.push(b'\n');
            bytes
        })
    }

    fn footer(&self) -> Option<Vec<u8>> {
        self.footer.as_ref().map(|text| {
            let mut bytes = text.clone().into_bytes();
            bytes.push(b'\n');
            bytes
        })
    }
}

#[derive(Debug)]
enum Chunk {
    Literal(String),
    Field { pad: Pad, conv: Conv },
}

#[derive(Debug, Clone, Copy, Default)]
struct Pad {
    min: usize,
    max: Option<usize>,
    left_justify: bool,
}

#[derive(Debug)]
enum Conv {
    Date(DateFormat),
    Level,
    LoggerName,
    Message,
    Thread,
    ContextStack,
    Property(String),
    ErrorChain,
    Newline,
}

impl Conv {
    fn render(&self, record: &Record, out: &mut String) -> Result<(), Error> {
        match self {
            Conv::Date(format) => format.render(record.time(), out),
            Conv::Level => {
                out.push_str(record.level().name());
                Ok(())
            }
            Conv::LoggerName => {
                out.push_str(record.logger());
                Ok(())
            }
            Conv::Message => {
                out.push_str(record.payload());
                Ok(())
            }
            Conv::Thread => {
                out.push_str(record.thread());
                Ok(())
            }
            Conv::ContextStack => {
                for (i, frame) in record.context().iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(frame);
                }
                Ok(())
            }
            Conv::Property(key) => match record.properties().get(key) {
                Some(value) => write!(out, "{value}").map_err(Error::from_fmt_error),
                None => {
                    out.push_str("(null)");
                    Ok(())
                }
            },
            Conv::ErrorChain => {
                if let Some(err) = record.error() {
                    write!(out, "{err}").map_err(Error::from_fmt_error)?;
                    let mut source = err.source();
                    while let Some(cause) = source {
                        write!(out, "; caused by: {cause}").map_err(Error::from_fmt_error)?;
                        source = cause.source();
                    }
                }
                Ok(())
            }
            Conv::Newline => {
                out.push('\n');
                Ok(())
            }
        }
    }
}

/// A strftime date renderer with a seconds-granularity cache.
///
/// Most log volume clusters within the same second, so the formatted text is
/// reused until the timestamp crosses a one-second boundary. Formatting is
/// idempotent per second, so a stale entry self-corrects on the next call.
#[derive(Debug)]
struct DateFormat {
    pattern: Option<String>,
    cache: Mutex<DateCache>,
}

#[derive(Debug, Default)]
struct DateCache {
    second: Option<i64>,
    text: String,
}

impl DateFormat {
    fn new(pattern: Option<String>) -> DateFormat {
        DateFormat {
            pattern,
            cache: Mutex::new(DateCache::default()),
        }
    }

    fn render(&self, time: Timestamp, out: &mut String) -> Result<(), Error> {
        let second = time.as_second();
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if cache.second != Some(second) {
                let zoned = time.to_zoned(TimeZone::system());
                let pattern = self.pattern.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                let mut text = String::new();
                write!(text, "{}", zoned.strftime(pattern)).map_err(Error::from_fmt_error)?;
                cache.second = Some(second);
                cache.text = text;
            }
            out.push_str(&cache.text);
        }
        if self.pattern.is_none() {
            let millis = time.subsec_nanosecond() / 1_000_000;
            let _ = write!(out, ",{millis:03}");
        }
        Ok(())
    }
}

fn apply_pad(pad: &Pad, field: &str, out: &mut String) {
    let count = field.chars().count();
    if let Some(max) = pad.max {
        if count > max {
            // keep the tail; the rightmost characters carry the detail
            let skip = count - max;
            out.extend(field.chars().skip(skip));
            return;
        }
    }
    if count >= pad.min {
        out.push_str(field);
        return;
    }
    let fill = pad.min - count;
    if pad.left_justify {
        out.push_str(field);
        out.extend(std::iter::repeat_n(' ', fill));
    } else {
        out.extend(std::iter::repeat_n(' ', fill));
        out.push_str(field);
    }
}

fn parse(pattern: &str) -> Result<Vec<Chunk>, Error> {
    let mut chunks = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            literal.push('%');
            continue;
        }

        let pad = parse_pad(pattern, &mut chars)?;
        let Some(conv) = chars.next() else {
            return Err(
                Error::new("conversion pattern ends inside a specifier")
                    .with_context("pattern", pattern),
            );
        };
        let conv = match conv {
            'd' => Conv::Date(DateFormat::new(take_braced(pattern, &mut chars)?)),
            'p' => Conv::Level,
            'c' => Conv::LoggerName,
            'm' => Conv::Message,
            't' => Conv::Thread,
            'x' => Conv::ContextStack,
            'X' => {
                let key = take_braced(pattern, &mut chars)?.ok_or_else(|| {
                    Error::new("%X requires a {key} argument").with_context("pattern", pattern)
                })?;
                Conv::Property(key)
            }
            'e' => Conv::ErrorChain,
            'n' => Conv::Newline,
            other => {
                return Err(
                    Error::new(format!("unknown conversion character: {other:?}"))
                        .with_context("pattern", pattern),
                );
            }
        };

        if !literal.is_empty() {
            chunks.push(Chunk::Literal(std::mem::take(&mut literal)));
        }
        chunks.push(Chunk::Field { pad, conv });
    }

    if !literal.is_empty() {
        chunks.push(Chunk::Literal(literal));
    }
    Ok(chunks)
}

fn parse_pad(pattern: &str, chars: &mut Peekable<Chars>) -> Result<Pad, Error> {
    let mut pad = Pad::default();
    if chars.peek() == Some(&'-') {
        chars.next();
        pad.left_justify = true;
    }
    if let Some(min) = take_digits(chars) {
        pad.min = min
            .parse()
            .map_err(|_| Error::new("field width out of range").with_context("pattern", pattern))?;
    } else if pad.left_justify {
        return Err(Error::new("'-' must be followed by a field width")
            .with_context("pattern", pattern));
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        let digits = take_digits(chars).ok_or_else(|| {
            Error::new("'.' must be followed by a maximum width").with_context("pattern", pattern)
        })?;
        pad.max = Some(digits.parse().map_err(|_| {
            Error::new("maximum width out of range").with_context("pattern", pattern)
        })?);
    }
    Ok(pad)
}

fn take_digits(chars: &mut Peekable<Chars>) -> Option<String> {
    let mut digits = String::new();
    while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
        digits.push(*d);
        chars.next();
    }
    if digits.is_empty() { None } else { Some(digits) }
}

fn take_braced(pattern: &str, chars: &mut Peekable<Chars>) -> Result<Option<String>, Error> {
    if chars.peek() != Some(&'{') {
        return Ok(None);
    }
    chars.next();
    let mut arg = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(Some(arg));
        }
        arg.push(c);
    }
    Err(Error::new("unterminated '{' in conversion pattern").with_context("pattern", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::str_value;
    use crate::level::Level;

    fn render(layout: &PatternLayout, record: &Record) -> String {
        String::from_utf8(layout.format(record).unwrap()).unwrap()
    }

    #[test]
    fn test_basic_conversions() {
        let layout = PatternLayout::new("%p %c: %m%n").unwrap();
        let record = Record::builder(Level::WARN, "low disk")
            .logger("store.compactor")
            .build();
        assert_eq!(render(&layout, &record), "WARN store.compactor: low disk\n");
    }

    #[test]
    fn test_min_width_padding() {
        let layout = PatternLayout::new("[%5p]").unwrap();
        let record = Record::builder(Level::INFO, "x").build();
        assert_eq!(render(&layout, &record), "[ INFO]");

        let layout = PatternLayout::new("[%-5p]").unwrap();
        assert_eq!(render(&layout, &record), "[INFO ]");
    }

    #[test]
    fn test_max_width_keeps_tail() {
        let layout = PatternLayout::new("%.6c").unwrap();
        let record = Record::builder(Level::INFO, "x")
            .logger("store.compactor")
            .build();
        assert_eq!(render(&layout, &record), "pactor");
    }

    #[test]
    fn test_property_lookup_and_null() {
        let layout = PatternLayout::new("%X{request}/%X{absent}").unwrap();
        let record = Record::builder(Level::INFO, "x")
            .property("request", str_value("r-7"))
            .build();
        assert_eq!(render(&layout, &record), "r-7/(null)");
    }

    #[test]
    fn test_percent_escape() {
        let layout = PatternLayout::new("100%% %m").unwrap();
        let record = Record::builder(Level::INFO, "done").build();
        assert_eq!(render(&layout, &record), "100% done");
    }

    #[test]
    fn test_error_chain() {
        let inner = std::io::Error::other("disk gone");
        let outer = std::io::Error::new(std::io::ErrorKind::BrokenPipe, inner);
        let layout = PatternLayout::new("%m: %e").unwrap();
        let record = Record::builder(Level::ERROR, "flush failed")
            .error(outer)
            .build();
        assert_eq!(render(&layout, &record), "flush failed: disk gone; caused by: disk gone");
    }

    #[test]
    fn test_parse_rejects_unknown_conversion() {
        assert!(PatternLayout::new("%q").is_err());
        assert!(PatternLayout::new("%X").is_err());
        assert!(PatternLayout::new("%X{open").is_err());
        assert!(PatternLayout::new("tail %").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_date_format() {
        assert!(PatternLayout::new("%d{%&}").is_err());
    }

    #[test]
    fn test_date_cache_within_one_second() {
        let layout = PatternLayout::new("%d{%H:%M:%S}").unwrap();
        let second = 1_255_176_300;
        let t1 = Timestamp::from_second(second).unwrap();
        let t2 = Timestamp::from_millisecond(second * 1000 + 500).unwrap();
        let t3 = Timestamp::from_second(second + 1).unwrap();

        let a = render(&layout, &Record::builder(Level::INFO, "x").time(t1).build());
        let b = render(&layout, &Record::builder(Level::INFO, "x").time(t2).build());
        let c = render(&layout, &Record::builder(Level::INFO, "x").time(t3).build());
        assert_eq!(a, b);
        assert_ne!(b, c);

        // going back to the first second reformats to the same text
        let again = render(&layout, &Record::builder(Level::INFO, "x").time(t1).build());
        assert_eq!(a, again);
    }

    #[test]
    fn test_default_date_appends_millis() {
        let layout = PatternLayout::new("%d").unwrap();
        let time = Timestamp::from_millisecond(1_255_176_300_042).unwrap();
        let record = Record::builder(Level::INFO, "x").time(time).build();
        assert!(render(&layout, &record).ends_with(",042"));
    }

    #[test]
    fn test_header_and_footer() {
        let layout = PatternLayout::new("%m")
            .unwrap()
            .with_header("session start")
            .with_footer("session end");
        assert_eq!(layout.header().unwrap(), b"session start\n");
        assert_eq!(layout.footer().unwrap(), b"session end\n");
    }
}
