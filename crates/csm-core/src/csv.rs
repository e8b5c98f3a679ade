//! Minimal RFC 4180 codec for task and account interchange files.
//!
//! Writing quotes only the fields that need it. Reading accepts quoted
//! fields spanning lines, CRLF or LF line endings, and a leading UTF-8 BOM.
//! Blank lines between records are ignored.

use crate::error::{CsmError, Result};
use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

/// Quote `value` if it contains a delimiter, quote, or line break.
#[must_use]
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Append one record, newline-terminated, to `out`.
pub fn write_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field.as_ref()));
    }
    out.push('\n');
}

/// One decoded record and the line it started on (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Streaming record reader over an in-memory document.
pub struct CsvReader<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    failed: bool,
}

impl<'a> CsvReader<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Self {
            chars: input.chars().peekable(),
            line: 1,
            failed: false,
        }
    }

    fn read_record(&mut self) -> Option<Result<CsvRecord>> {
        'record: loop {
            let start = self.line;
            let mut fields = Vec::new();
            let mut field = String::new();
            let mut in_quotes = false;
            let mut touched = false;

            while let Some(c) = self.chars.next() {
                if in_quotes {
                    match c {
                        '"' if self.chars.peek() == Some(&'"') => {
                            self.chars.next();
                            field.push('"');
                        }
                        '"' => in_quotes = false,
                        '\n' => {
                            self.line += 1;
                            field.push(c);
                        }
                        _ => field.push(c),
                    }
                    continue;
                }

                match c {
                    '"' if field.is_empty() => {
                        in_quotes = true;
                        touched = true;
                    }
                    ',' => {
                        fields.push(std::mem::take(&mut field));
                        touched = true;
                    }
                    '\r' if self.chars.peek() == Some(&'\n') => {}
                    '\r' | '\n' => {
                        self.line += 1;
                        if !touched && field.is_empty() && fields.is_empty() {
                            continue 'record;
                        }
                        fields.push(field);
                        return Some(Ok(CsvRecord {
                            line: start,
                            fields,
                        }));
                    }
                    _ => {
                        field.push(c);
                        touched = true;
                    }
                }
            }

            if in_quotes {
                self.failed = true;
                return Some(Err(CsmError::parse(format!(
                    "line {start}: unterminated quoted field"
                ))));
            }
            if !touched && field.is_empty() && fields.is_empty() {
                return None;
            }
            fields.push(field);
            return Some(Ok(CsvRecord {
                line: start,
                fields,
            }));
        }
    }
}

impl Iterator for CsvReader<'_> {
    type Item = Result<CsvRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.read_record()
    }
}
