//! Payload and timestamp rendering.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EventError;

/// How payload bytes are rendered for display and durable rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Upper-case hex pairs separated by `-`, e.g. `41-01-42`.
    #[default]
    Binary,
    /// Printable ASCII passes through, everything else becomes `[xx]`.
    Ascii,
    /// Lossy UTF-8 decode.
    Utf8,
}

impl DataFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Binary => "binary",
            DataFormat::Ascii => "ascii",
            DataFormat::Utf8 => "utf8",
        }
    }

    /// Renders `data` in this format. Empty input renders as an empty string.
    pub fn render(&self, data: &[u8]) -> String {
        match self {
            DataFormat::Binary => render_hex(data),
            DataFormat::Ascii => {
                let mut out = String::with_capacity(data.len());
                for segment in ascii_segments(data) {
                    match segment {
                        AsciiSegment::Text(text) => out.push_str(text),
                        AsciiSegment::Escaped(byte) => {
                            out.push_str(&format!("[{:02x}]", byte));
                        }
                    }
                }
                out
            }
            DataFormat::Utf8 => String::from_utf8_lossy(data).into_owned(),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataFormat {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(DataFormat::Binary),
            "ascii" | "asciitext" => Ok(DataFormat::Ascii),
            "utf8" | "utf8text" => Ok(DataFormat::Utf8),
            _ => Err(EventError::UnknownFormat(s.to_string())),
        }
    }
}

fn render_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    out
}

/// A run of printable ASCII, or a single byte that must be escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiSegment<'a> {
    Text(&'a str),
    Escaped(u8),
}

/// Splits `data` into printable runs (0x20..0x7F) and escaped bytes.
///
/// Lets display code style escapes differently from plain text.
pub fn ascii_segments(data: &[u8]) -> impl Iterator<Item = AsciiSegment<'_>> {
    let mut rest = data;
    std::iter::from_fn(move || {
        let first = *rest.first()?;
        if !is_printable(first) {
            rest = &rest[1..];
            return Some(AsciiSegment::Escaped(first));
        }

        let len = rest.iter().position(|b| !is_printable(*b)).unwrap_or(rest.len());
        let (text, tail) = rest.split_at(len);
        rest = tail;
        // Printable ASCII is always valid UTF-8.
        std::str::from_utf8(text).ok().map(AsciiSegment::Text)
    })
}

fn is_printable(byte: u8) -> bool {
    (0x20..0x7F).contains(&byte)
}

const UTC_ISO8601: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const LOG_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// `yyyy-MM-ddTHH:mm:ss.ffffffZ`, used for live display.
pub fn format_utc_iso8601(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(UTC_ISO8601).to_string()
}

/// `yyyy-MM-ddTHH:mm:ss.fff` in UTC, used for durable rows.
pub fn format_log_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(LOG_TIMESTAMP).to_string()
}

/// Parses a durable-row timestamp (any fractional precision, optional `Z`).
pub fn parse_log_timestamp(value: &str) -> Result<DateTime<Utc>, EventError> {
    let trimmed = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| EventError::InvalidTimestamp {
            value: value.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case::binary(DataFormat::Binary, &[0x41, 0x01, 0x42], "41-01-42")]
    #[case::binary_upper(DataFormat::Binary, &[0xab, 0xff], "AB-FF")]
    #[case::ascii(DataFormat::Ascii, &[0x41, 0x01, 0x42], "A[01]B")]
    #[case::ascii_high(DataFormat::Ascii, b"ok\r\n\x7f", "ok[0d][0a][7f]")]
    #[case::utf8(DataFormat::Utf8, "héllo ✓".as_bytes(), "héllo ✓")]
    #[case::utf8_invalid(DataFormat::Utf8, &[0x61, 0xff], "a\u{fffd}")]
    #[case::empty_binary(DataFormat::Binary, &[], "")]
    #[case::empty_ascii(DataFormat::Ascii, &[], "")]
    fn test_render(#[case] format: DataFormat, #[case] data: &[u8], #[case] expected: &str) {
        assert_eq!(format.render(data), expected);
    }

    #[test]
    fn test_ascii_segments() {
        let segments: Vec<_> = ascii_segments(b"ab\x00\x01cd").collect();
        assert_eq!(
            segments,
            vec![
                AsciiSegment::Text("ab"),
                AsciiSegment::Escaped(0),
                AsciiSegment::Escaped(1),
                AsciiSegment::Text("cd"),
            ]
        );
    }

    #[rstest]
    #[case("binary", DataFormat::Binary)]
    #[case("ASCII", DataFormat::Ascii)]
    #[case("AsciiText", DataFormat::Ascii)]
    #[case("utf8", DataFormat::Utf8)]
    fn test_parse_format(#[case] input: &str, #[case] expected: DataFormat) {
        assert_eq!(input.parse::<DataFormat>().unwrap(), expected);
    }

    #[test]
    fn test_parse_format_unknown() {
        assert!(matches!(
            "hex".parse::<DataFormat>(),
            Err(EventError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_format_serde_names() {
        assert_eq!(serde_json::to_string(&DataFormat::Utf8).unwrap(), "\"utf8\"");
    }

    #[test]
    fn test_timestamps() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
            + chrono::TimeDelta::microseconds(123_456);
        assert_eq!(format_utc_iso8601(&ts), "2024-03-09T07:05:01.123456Z");
        assert_eq!(format_log_timestamp(&ts), "2024-03-09T07:05:01.123");

        let parsed = parse_log_timestamp("2024-03-09T07:05:01.123").unwrap();
        assert_eq!(parsed, ts - chrono::TimeDelta::microseconds(456));
        assert!(parse_log_timestamp("yesterday").is_err());
    }
}
