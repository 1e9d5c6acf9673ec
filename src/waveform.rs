//! Waveform preamble parsing and raw sample decoding
//!
//! Converts an unsigned 8-bit sample block plus the instrument's preamble into
//! calibrated `(time, voltage)` pairs. Everything in this module is pure: no I/O
//! and no state shared between calls.

use serde::Serialize;
use std::str::FromStr;

use crate::error::ScopeError;

/// Sample code corresponding to 0 V (vertical screen center)
pub const MID_CODE: f64 = 130.0;
/// Sample codes per vertical division
pub const COUNTS_PER_DIVISION: f64 = 25.0;
/// Number of comma-separated fields in a preamble reply
pub const PREAMBLE_FIELDS: usize = 10;

/// Scaling metadata returned by the preamble query.
///
/// Field order follows the reply: format, type, points, count, x increment,
/// x origin, x reference, y increment, y origin, y reference. The integer
/// header fields and the y-axis fields are parsed to validate the reply but
/// decoding relies on the live channel scale instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preamble {
    pub format_code: i64,
    pub type_code: i64,
    pub point_count: i64,
    pub average_count: i64,
    /// Seconds between adjacent samples
    pub x_increment: f64,
    /// Time of the reference sample in seconds
    pub x_origin: f64,
    /// Index of the reference sample
    pub x_reference: i64,
    pub y_increment: f64,
    pub y_origin: f64,
    pub y_reference: i64,
}

impl Preamble {
    /// Parse a preamble reply. Fields beyond the tenth are ignored.
    pub fn parse(reply: &str) -> Result<Self, ScopeError> {
        let fields: Vec<&str> = reply.trim().split(',').map(str::trim).collect();
        if fields.len() < PREAMBLE_FIELDS {
            return Err(ScopeError::Protocol(format!(
                "malformed preamble: expected {PREAMBLE_FIELDS} fields, got {}",
                fields.len()
            )));
        }

        Ok(Self {
            format_code: parse_integer(fields[0], "format")?,
            type_code: parse_integer(fields[1], "type")?,
            point_count: parse_integer(fields[2], "points")?,
            average_count: parse_integer(fields[3], "count")?,
            x_increment: parse_float(fields[4], "x increment")?,
            x_origin: parse_float(fields[5], "x origin")?,
            x_reference: parse_integer(fields[6], "x reference")?,
            y_increment: parse_float(fields[7], "y increment")?,
            y_origin: parse_float(fields[8], "y origin")?,
            y_reference: parse_integer(fields[9], "y reference")?,
        })
    }
}

impl FromStr for Preamble {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_float(field: &str, name: &str) -> Result<f64, ScopeError> {
    field.parse::<f64>().map_err(|_| {
        ScopeError::Protocol(format!(
            "malformed preamble: {name} field '{field}' is not a number"
        ))
    })
}

// Some firmware reports integer fields in exponent notation (e.g. "1.200000e+03")
fn parse_integer(field: &str, name: &str) -> Result<i64, ScopeError> {
    if let Ok(value) = field.parse::<i64>() {
        return Ok(value);
    }
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(ScopeError::Protocol(format!(
            "malformed preamble: {name} field '{field}' is not an integer"
        ))),
    }
}

/// Calibrated waveform: `voltage[i]` was sampled at `time[i]`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WaveformSamples {
    time: Vec<f64>,
    voltage: Vec<f64>,
}

impl WaveformSamples {
    /// Time axis in seconds
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Voltage axis in volts
    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Iterate over `(time, voltage)` pairs
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.voltage.iter().copied())
    }

    /// Minimum and maximum voltage, `None` when empty
    pub fn voltage_range(&self) -> Option<(f64, f64)> {
        if self.voltage.is_empty() {
            return None;
        }
        let min = self.voltage.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = self.voltage.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        Some((min, max))
    }

    /// Time spanned from first to last sample
    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.time, self.voltage)
    }
}

/// Convert raw sample codes into calibrated time/voltage pairs.
///
/// `vertical_scale` is the channel's volts/division and `probe_attenuation`
/// the probe factor, both read live from the instrument. The output has
/// exactly `raw.len()` points regardless of the preamble's point count.
///
/// # Errors
/// `ScopeError::Arithmetic` if `probe_attenuation` is zero or not finite, or
/// if `vertical_scale` is not finite.
pub fn decode(
    raw: &[u8],
    preamble: &Preamble,
    vertical_scale: f64,
    probe_attenuation: f64,
) -> Result<WaveformSamples, ScopeError> {
    if probe_attenuation == 0.0 || !probe_attenuation.is_finite() {
        return Err(ScopeError::Arithmetic(format!(
            "cannot adjust vertical scale by probe attenuation {probe_attenuation}"
        )));
    }
    if !vertical_scale.is_finite() {
        return Err(ScopeError::Arithmetic(format!(
            "vertical scale {vertical_scale} is not a finite number"
        )));
    }
    let adjusted_scale = vertical_scale / probe_attenuation;
    let x_reference = preamble.x_reference as f64;

    let voltage = raw
        .iter()
        .map(|&code| ((f64::from(code) - MID_CODE) / COUNTS_PER_DIVISION) * adjusted_scale)
        .collect();
    let time = (0..raw.len())
        .map(|i| (i as f64 - x_reference) * preamble.x_increment + preamble.x_origin)
        .collect();

    Ok(WaveformSamples { time, voltage })
}
