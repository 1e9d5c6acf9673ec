use log::{debug, info, warn};

use super::ScopeSession;
use crate::error::ScopeError;
use crate::scope::protocol::{Command, Query};
use crate::scope::transport::Transport;
use crate::types::{Channel, WaveformFormat, WaveformMode};
use crate::waveform::{decode, Preamble, WaveformSamples};

const PREVIEW_POINTS: usize = 10;

impl<T: Transport> ScopeSession<T> {
    /// Echoed waveform transfer format
    pub fn waveform_format(&mut self) -> Result<WaveformFormat, ScopeError> {
        self.ask(Query::WaveformFormat)?.parse()
    }

    /// Acquire the displayed waveform of `channel` in physical units.
    ///
    /// Selects the source, requests 8-bit normal-mode transfer, reads the
    /// preamble and the sample block, then reads the channel's current
    /// vertical scale and probe attenuation and decodes. Scale values are the
    /// live instrument settings, not the ones last requested through this
    /// session.
    ///
    /// # Errors
    /// - `ScopeError::NotConnected` when disconnected (nothing is sent)
    /// - `ScopeError::Protocol` for a malformed preamble, an unparsable or
    ///   non-finite scale reply or an empty data block; also for a point-count
    ///   mismatch when strict point counting is enabled
    /// - `ScopeError::Io`/`ScopeError::Timeout` on link failures, after which
    ///   the session is disconnected
    /// - `ScopeError::Arithmetic` if the probe attenuation reads as zero
    pub fn query_waveform(&mut self, channel: Channel) -> Result<WaveformSamples, ScopeError> {
        self.send(Command::WaveformSource(channel))?;
        self.send(Command::WaveformFormat(WaveformFormat::Byte))?;
        self.send(Command::WaveformMode(WaveformMode::Normal))?;

        // Echo only; decoding always assumes byte format
        let format = self.ask(Query::WaveformFormat)?;
        debug!("Data format set to: {}", format.trim());

        let preamble = Preamble::parse(&self.ask(Query::Preamble)?)?;
        debug!(
            "x_increment: {}, x_origin: {}, x_reference: {}",
            preamble.x_increment, preamble.x_origin, preamble.x_reference
        );
        debug!(
            "y_increment: {}, y_origin: {}, y_reference: {}",
            preamble.y_increment, preamble.y_origin, preamble.y_reference
        );

        let raw = self.ask_binary(Query::WaveformData)?;
        if raw.is_empty() {
            return Err(ScopeError::Protocol(format!(
                "Empty waveform data block for {channel}"
            )));
        }
        debug!("Raw data sample: {:?}", &raw[..raw.len().min(PREVIEW_POINTS)]);

        if raw.len() as i64 != preamble.point_count {
            if self.strict_point_count() {
                return Err(ScopeError::Protocol(format!(
                    "Preamble announced {} points but {} bytes were transferred",
                    preamble.point_count,
                    raw.len()
                )));
            }
            warn!(
                "Preamble announced {} points, decoding the {} transferred bytes",
                preamble.point_count,
                raw.len()
            );
        }

        let vertical_scale = self.voltage_scale(channel)?;
        let probe_attenuation = self.probe_attenuation(channel)?;
        debug!("Vertical scale: {vertical_scale}, Probe attenuation: {probe_attenuation}");

        let samples = decode(&raw, &preamble, vertical_scale, probe_attenuation)?;
        debug!(
            "Voltage sample: {:?}",
            &samples.voltage()[..samples.len().min(PREVIEW_POINTS)]
        );

        info!("Acquired {} points from {channel}", samples.len());
        Ok(samples)
    }
}
