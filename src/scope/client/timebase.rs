use super::{require_positive, ScopeSession};
use crate::error::ScopeError;
use crate::scope::protocol::{Command, Query};
use crate::scope::transport::Transport;

impl<T: Transport> ScopeSession<T> {
    /// Set the horizontal scale in seconds per division
    pub fn set_timebase(&mut self, seconds_per_div: f64) -> Result<(), ScopeError> {
        self.ensure_connected()?;
        let seconds_per_div = require_positive(seconds_per_div, "Seconds per division")?;
        self.send(Command::TimebaseScale(seconds_per_div))
    }

    /// Current horizontal scale in seconds per division
    pub fn timebase(&mut self) -> Result<f64, ScopeError> {
        self.ask_f64(Query::TimebaseScale)
    }
}
