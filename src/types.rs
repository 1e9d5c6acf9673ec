use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScopeError;

/// Analog input channel of a four-channel oscilloscope (1-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Channel {
    Ch1 = 1,
    Ch2 = 2,
    Ch3 = 3,
    Ch4 = 4,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4];

    /// Channel number as used in command mnemonics
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Channel {
    type Error = ScopeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Channel::Ch1),
            2 => Ok(Channel::Ch2),
            3 => Ok(Channel::Ch3),
            4 => Ok(Channel::Ch4),
            _ => Err(ScopeError::InvalidArgument(format!(
                "Channel must be 1-4, got {value}"
            ))),
        }
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.number()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CHAN{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    #[default]
    Edge,
    Pulse,
    Video,
}

impl TriggerMode {
    pub fn as_scpi(self) -> &'static str {
        match self {
            TriggerMode::Edge => "EDGE",
            TriggerMode::Pulse => "PULSE",
            TriggerMode::Video => "VIDEO",
        }
    }
}

impl FromStr for TriggerMode {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EDGE" => Ok(TriggerMode::Edge),
            "PULSE" | "PULS" => Ok(TriggerMode::Pulse),
            "VIDEO" | "VID" => Ok(TriggerMode::Video),
            other => Err(ScopeError::InvalidArgument(format!(
                "Unknown trigger mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerSlope {
    #[default]
    #[serde(rename = "pos", alias = "positive")]
    Positive,
    #[serde(rename = "neg", alias = "negative")]
    Negative,
}

impl TriggerSlope {
    pub fn as_scpi(self) -> &'static str {
        match self {
            TriggerSlope::Positive => "POS",
            TriggerSlope::Negative => "NEG",
        }
    }
}

// Accepts both the mnemonic and the spelled-out labels shown to operators
impl FromStr for TriggerSlope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POS" | "POSITIVE" | "RISING" => Ok(TriggerSlope::Positive),
            "NEG" | "NEGATIVE" | "FALLING" => Ok(TriggerSlope::Negative),
            other => Err(ScopeError::InvalidArgument(format!(
                "Unknown trigger slope: {other}"
            ))),
        }
    }
}

/// Trigger setup pushed to the instrument in one `set_trigger` call.
/// Never read back from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub mode: TriggerMode,
    pub source: Channel,
    pub slope: TriggerSlope,
    /// Trigger level in volts
    pub level: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: TriggerMode::Edge,
            source: Channel::Ch1,
            slope: TriggerSlope::Positive,
            level: 1.5,
        }
    }
}

/// Encoding of the waveform data transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformFormat {
    /// One unsigned byte per point
    Byte,
    /// Two bytes per point
    Word,
    Ascii,
}

impl WaveformFormat {
    pub fn as_scpi(self) -> &'static str {
        match self {
            WaveformFormat::Byte => "BYTE",
            WaveformFormat::Word => "WORD",
            WaveformFormat::Ascii => "ASC",
        }
    }
}

impl FromStr for WaveformFormat {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BYTE" => Ok(WaveformFormat::Byte),
            "WORD" => Ok(WaveformFormat::Word),
            "ASC" | "ASCII" => Ok(WaveformFormat::Ascii),
            other => Err(ScopeError::Protocol(format!(
                "Unknown waveform format: {other}"
            ))),
        }
    }
}

/// Which buffer the waveform data transfer reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformMode {
    /// Points currently displayed on screen
    Normal,
}

impl WaveformMode {
    pub fn as_scpi(self) -> &'static str {
        match self {
            WaveformMode::Normal => "NORMAL",
        }
    }
}

/// Complete acquisition setup as applied by "apply settings"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeSettings {
    pub channel: Channel,
    /// Seconds per division
    pub timebase: f64,
    /// Volts per division on `channel`
    pub volts_per_div: f64,
    pub trigger: TriggerConfig,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            channel: Channel::Ch1,
            timebase: 200e-6,
            volts_per_div: 1.0,
            trigger: TriggerConfig::default(),
        }
    }
}
