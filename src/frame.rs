//! Report framing
//!
//! Converts operator hex text into fixed-size report buffers and back.
//! Payloads shorter than the report size are zero-padded on the right;
//! longer payloads are rejected.

use std::fmt;

use thiserror::Error;

/// Default report size in bytes
pub const DEFAULT_REPORT_SIZE: usize = 32;

/// Framing failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Invalid hex: odd number of digits ({0})")]
    OddLength(usize),

    #[error("Invalid hex: '{ch}' at position {pos}")]
    InvalidDigit { ch: char, pos: usize },

    #[error("Payload of {len} bytes exceeds report size {max}")]
    Oversize { len: usize, max: usize },

    #[error("Report size must be at least 1 byte")]
    ZeroReportSize,
}

impl FramingError {
    /// Malformed operator input (as opposed to a size problem)
    pub fn is_invalid_hex(&self) -> bool {
        matches!(self, Self::OddLength(_) | Self::InvalidDigit { .. })
    }
}

/// One fixed-size report
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Report(Vec<u8>);

impl Report {
    /// Zero-pad `payload` to `size` bytes
    pub fn padded(payload: &[u8], size: usize) -> Result<Self, FramingError> {
        if size == 0 {
            return Err(FramingError::ZeroReportSize);
        }
        if payload.len() > size {
            return Err(FramingError::Oversize {
                len: payload.len(),
                max: size,
            });
        }
        let mut buf = vec![0u8; size];
        buf[..payload.len()].copy_from_slice(payload);
        Ok(Self(buf))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Report {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&decode(&self.0))
    }
}

/// Hex text <-> report converter for one report size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    report_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            report_size: DEFAULT_REPORT_SIZE,
        }
    }
}

impl FrameCodec {
    pub fn new(report_size: usize) -> Result<Self, FramingError> {
        if report_size == 0 {
            return Err(FramingError::ZeroReportSize);
        }
        Ok(Self { report_size })
    }

    pub fn report_size(&self) -> usize {
        self.report_size
    }

    /// Parse hex text (whitespace ignored) into one report
    pub fn encode(&self, text: &str) -> Result<Report, FramingError> {
        let bytes = parse_hex(text)?;
        self.frame(&bytes)
    }

    /// Frame raw bytes into one report
    pub fn frame(&self, payload: &[u8]) -> Result<Report, FramingError> {
        Report::padded(payload, self.report_size)
    }
}

fn hex_value(ch: char) -> Option<u8> {
    ch.to_digit(16).map(|d| d as u8)
}

/// Parse hex text into bytes, ignoring all whitespace
///
/// Digit positions in errors count non-whitespace characters only.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, FramingError> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();

    if let Some((pos, &ch)) = digits.iter().enumerate().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(FramingError::InvalidDigit { ch, pos });
    }
    if digits.len() % 2 != 0 {
        return Err(FramingError::OddLength(digits.len()));
    }

    Ok(digits
        .chunks(2)
        .filter_map(|pair| Some((hex_value(pair[0])? << 4) | hex_value(pair[1])?))
        .collect())
}

/// Render bytes as uppercase hex pairs separated by single spaces
pub fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
