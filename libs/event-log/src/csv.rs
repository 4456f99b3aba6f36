//! CSV row encoding.
//!
//! Quoting follows RFC 4180: a field containing a comma, a double quote, CR or
//! LF is wrapped in double quotes and embedded quotes are doubled.

use std::io::{self, BufRead};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// UTF-8 byte-order mark written at the start of every log file.
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Row terminator for the host platform.
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Destination for structured rows.
#[async_trait]
pub trait RowSink: Send {
    /// Appends one row.
    async fn write_row(&mut self, fields: &[&str]) -> io::Result<()>;

    /// Pushes buffered rows to the underlying storage.
    async fn flush(&mut self) -> io::Result<()>;
}

/// Encodes one row, including the trailing line terminator.
pub fn encode_row(fields: &[&str], line_ending: &str) -> String {
    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        push_escaped(&mut row, field);
    }
    row.push_str(line_ending);
    row
}

fn push_escaped(out: &mut String, field: &str) {
    if !field.contains([',', '"', '\r', '\n']) {
        out.push_str(field);
        return;
    }

    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// CSV writer over any async byte sink.
#[derive(Debug)]
pub struct CsvWriter<W> {
    inner: W,
    line_ending: &'static str,
}

impl<W> CsvWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps `inner` without writing anything.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            line_ending: LINE_ENDING,
        }
    }

    /// Wraps `inner` and writes the UTF-8 byte-order mark.
    pub async fn with_bom(mut inner: W) -> io::Result<Self> {
        inner.write_all(UTF8_BOM).await?;
        Ok(Self::new(inner))
    }

    /// Overrides the platform line terminator.
    pub fn line_ending(mut self, line_ending: &'static str) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W> RowSink for CsvWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_row(&mut self, fields: &[&str]) -> io::Result<()> {
        let row = encode_row(fields, self.line_ending);
        self.inner.write_all(row.as_bytes()).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}

/// Reads RFC 4180 rows back, tolerating a leading byte-order mark and
/// quoted fields spanning several lines.
#[derive(Debug)]
pub struct CsvReader<R> {
    inner: R,
    line_number: usize,
    started: bool,
}

impl<R: BufRead> CsvReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_number: 0,
            started: false,
        }
    }

    /// Physical line number of the last line consumed (1-based).
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the next row, or `None` at end of input.
    pub fn read_row(&mut self) -> io::Result<Option<Vec<String>>> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut line = String::new();

        loop {
            line.clear();
            if self.inner.read_line(&mut line)? == 0 {
                if in_quotes {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "unterminated quoted field",
                    ));
                }
                // A partial row is only possible when the last line had no
                // terminator, and that case returns below.
                return Ok(None);
            }
            self.line_number += 1;

            let mut text = line.as_str();
            if !self.started {
                self.started = true;
                text = text.strip_prefix('\u{feff}').unwrap_or(text);
            }

            let mut chars = text.chars().peekable();
            while let Some(c) = chars.next() {
                if in_quotes {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            field.push('"');
                        } else {
                            in_quotes = false;
                        }
                    } else {
                        field.push(c);
                    }
                    continue;
                }

                match c {
                    '"' => in_quotes = true,
                    ',' => fields.push(std::mem::take(&mut field)),
                    '\r' if chars.peek() == Some(&'\n') => {}
                    '\n' => {
                        fields.push(field);
                        return Ok(Some(fields));
                    }
                    _ => field.push(c),
                }
            }

            if !in_quotes {
                // Last line without a terminator.
                fields.push(field);
                return Ok(Some(fields));
            }
        }
    }
}

impl<R: BufRead> Iterator for CsvReader<R> {
    type Item = io::Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_row().transpose()
    }
}
