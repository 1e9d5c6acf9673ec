use super::{require_positive, ScopeSession};
use crate::error::ScopeError;
use crate::scope::protocol::{Command, Query};
use crate::scope::transport::Transport;
use crate::types::Channel;

impl<T: Transport> ScopeSession<T> {
    /// Select the channel used as waveform source
    pub fn set_channel(&mut self, channel: Channel) -> Result<(), ScopeError> {
        self.send(Command::WaveformSource(channel))
    }

    /// Set the vertical scale of a channel in volts per division
    pub fn set_voltage_scale(
        &mut self,
        channel: Channel,
        volts_per_div: f64,
    ) -> Result<(), ScopeError> {
        self.ensure_connected()?;
        let volts_per_div = require_positive(volts_per_div, "Volts per division")?;
        self.send(Command::ChannelScale(channel, volts_per_div))
    }

    /// Current vertical scale of a channel in volts per division
    pub fn voltage_scale(&mut self, channel: Channel) -> Result<f64, ScopeError> {
        self.ask_f64(Query::ChannelScale(channel))
    }

    /// Current probe attenuation factor of a channel
    pub fn probe_attenuation(&mut self, channel: Channel) -> Result<f64, ScopeError> {
        self.ask_f64(Query::ProbeAttenuation(channel))
    }
}
