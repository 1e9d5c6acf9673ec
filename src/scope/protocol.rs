use log::debug;
use std::fmt;
use std::io::{BufRead, Read};

use crate::error::ScopeError;
use crate::types::{Channel, TriggerMode, TriggerSlope, WaveformFormat, WaveformMode};

// Protocol constants
pub const TERMINATOR: u8 = b'\n';
pub const MAX_BLOCK_SIZE: usize = 100 * 1024 * 1024; // 100MB

/// Commands that change instrument state. No reply is expected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    WaveformSource(Channel),
    WaveformFormat(WaveformFormat),
    WaveformMode(WaveformMode),
    /// Seconds per division
    TimebaseScale(f64),
    /// Volts per division
    ChannelScale(Channel, f64),
    TriggerMode(TriggerMode),
    TriggerEdgeSource(Channel),
    TriggerEdgeSlope(TriggerSlope),
    /// Trigger level in volts, qualified by the source channel
    TriggerLevel(Channel, f64),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::WaveformSource(ch) => write!(f, ":WAV:SOUR {ch}"),
            Command::WaveformFormat(format) => write!(f, ":WAV:FORM {}", format.as_scpi()),
            Command::WaveformMode(mode) => write!(f, ":WAV:MODE {}", mode.as_scpi()),
            Command::TimebaseScale(seconds) => write!(f, ":TIM:SCAL {seconds}"),
            Command::ChannelScale(ch, volts) => write!(f, ":CHAN{}:SCAL {volts}", ch.number()),
            Command::TriggerMode(mode) => write!(f, ":TRIG:MODE {}", mode.as_scpi()),
            Command::TriggerEdgeSource(ch) => write!(f, ":TRIG:EDGE:SOUR {ch}"),
            Command::TriggerEdgeSlope(slope) => write!(f, ":TRIG:EDGE:SLOP {}", slope.as_scpi()),
            Command::TriggerLevel(ch, level) => write!(f, ":TRIG:LEV {ch},{level}"),
        }
    }
}

/// Queries that expect exactly one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Identity,
    WaveformFormat,
    Preamble,
    /// Binary block reply
    WaveformData,
    TimebaseScale,
    ChannelScale(Channel),
    ProbeAttenuation(Channel),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Identity => write!(f, "*IDN?"),
            Query::WaveformFormat => write!(f, ":WAV:FORM?"),
            Query::Preamble => write!(f, ":WAV:PRE?"),
            Query::WaveformData => write!(f, ":WAV:DATA?"),
            Query::TimebaseScale => write!(f, ":TIM:SCAL?"),
            Query::ChannelScale(ch) => write!(f, ":CHAN{}:SCAL?", ch.number()),
            Query::ProbeAttenuation(ch) => write!(f, ":CHAN{}:PROB?", ch.number()),
        }
    }
}

/// Low-level reply handling
pub struct Protocol;

impl Protocol {
    /// Parse a finite scalar numeric reply. Never substitutes a default.
    pub fn parse_f64(reply: &str, query: Query) -> Result<f64, ScopeError> {
        let trimmed = reply.trim();
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                ScopeError::Protocol(format!("Reply to {query} is not a finite number: '{trimmed}'"))
            })
    }

    /// Read one newline-terminated text reply, without the terminator
    pub fn read_line(reader: &mut dyn BufRead) -> Result<String, ScopeError> {
        let mut line = Vec::new();
        let n = reader
            .read_until(TERMINATOR, &mut line)
            .map_err(|e| ScopeError::io(e, "Reading text reply"))?;
        if n == 0 || line.last() != Some(&TERMINATOR) {
            return Err(ScopeError::io(
                std::io::ErrorKind::UnexpectedEof.into(),
                "Connection closed before end of reply",
            ));
        }
        let text = String::from_utf8(line)
            .map_err(|_| ScopeError::Protocol("Invalid UTF-8 in text reply".into()))?;
        Ok(text.trim_end().to_string())
    }

    /// Read an IEEE 488.2 definite-length block (`#<n><length><payload>`) and its terminator.
    ///
    /// `#0` indefinite-length blocks are rejected.
    pub fn read_block(reader: &mut dyn BufRead) -> Result<Vec<u8>, ScopeError> {
        let [hash] = Self::read_exact_bytes::<1>(reader)?;
        if hash != b'#' {
            return Err(ScopeError::Protocol(format!(
                "Binary block must start with '#', got 0x{hash:02x}"
            )));
        }

        let [digits] = Self::read_exact_bytes::<1>(reader)?;
        if !digits.is_ascii_digit() {
            return Err(ScopeError::Protocol(format!(
                "Invalid block header length digit 0x{digits:02x}"
            )));
        }
        let digits = usize::from(digits - b'0');

        // Byte samples may contain the terminator, so only definite lengths can be framed
        if digits == 0 {
            return Err(ScopeError::Protocol(
                "Indefinite-length (#0) blocks are not supported".into(),
            ));
        }

        let mut length_field = vec![0u8; digits];
        reader
            .read_exact(&mut length_field)
            .map_err(|e| ScopeError::io(e, "Reading block length field"))?;
        let length = std::str::from_utf8(&length_field)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| {
                ScopeError::Protocol(format!(
                    "Invalid block length field {:?}",
                    String::from_utf8_lossy(&length_field)
                ))
            })?;

        if length > MAX_BLOCK_SIZE {
            return Err(ScopeError::Protocol(format!(
                "Block size {length} exceeds maximum {MAX_BLOCK_SIZE}"
            )));
        }

        let mut payload = vec![0u8; length];
        reader
            .read_exact(&mut payload)
            .map_err(|e| ScopeError::io(e, format!("Reading {length} byte block payload")))?;
        debug!("Read definite-length block of {length} bytes");

        Self::consume_terminator(reader)?;
        Ok(payload)
    }

    fn consume_terminator(reader: &mut dyn BufRead) -> Result<(), ScopeError> {
        let [mut byte] = Self::read_exact_bytes::<1>(reader)?;
        if byte == b'\r' {
            [byte] = Self::read_exact_bytes::<1>(reader)?;
        }
        if byte != TERMINATOR {
            return Err(ScopeError::Protocol(format!(
                "Expected newline after binary block, got 0x{byte:02x}"
            )));
        }
        Ok(())
    }

    fn read_exact_bytes<const N: usize>(reader: &mut dyn BufRead) -> Result<[u8; N], ScopeError> {
        let mut buf = [0u8; N];
        reader
            .read_exact(&mut buf)
            .map_err(|e| ScopeError::io(e, format!("Failed to read {N} bytes from instrument")))?;
        Ok(buf)
    }
}
