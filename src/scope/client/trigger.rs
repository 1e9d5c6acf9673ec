use log::{debug, warn};

use super::ScopeSession;
use crate::error::ScopeError;
use crate::scope::protocol::Command;
use crate::scope::transport::Transport;
use crate::types::{Channel, TriggerConfig, TriggerMode, TriggerSlope};

impl<T: Transport> ScopeSession<T> {
    /// Configure the trigger with four sequential commands: mode, edge
    /// source, edge slope and the channel-qualified level.
    ///
    /// The sequence is not atomic. If a command fails, the ones before it
    /// remain applied on the instrument and the first failure is returned.
    pub fn set_trigger(
        &mut self,
        mode: TriggerMode,
        source: Channel,
        slope: TriggerSlope,
        level: f64,
    ) -> Result<(), ScopeError> {
        self.ensure_connected()?;
        if !level.is_finite() {
            return Err(ScopeError::InvalidArgument(format!(
                "Trigger level must be finite, got {level}"
            )));
        }

        let commands = [
            Command::TriggerMode(mode),
            Command::TriggerEdgeSource(source),
            Command::TriggerEdgeSlope(slope),
            Command::TriggerLevel(source, level),
        ];

        for (applied, command) in commands.into_iter().enumerate() {
            if let Err(e) = self.send(command) {
                warn!(
                    "Trigger setup aborted at '{command}' after {applied} of {} commands; instrument trigger is partially configured",
                    commands.len()
                );
                return Err(e);
            }
        }

        debug!("Trigger set: {mode:?} on {source}, {slope:?} slope, {level} V");
        Ok(())
    }

    pub fn apply_trigger(&mut self, trigger: &TriggerConfig) -> Result<(), ScopeError> {
        self.set_trigger(trigger.mode, trigger.source, trigger.slope, trigger.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::mock::MockTransport;

    fn connected(mock: &MockTransport) -> ScopeSession<MockTransport> {
        let mut scope = ScopeSession::new(mock.clone());
        scope.connect("10.0.0.2").unwrap();
        mock.clear_calls();
        scope
    }

    #[test]
    fn test_trigger_command_sequence() {
        let mock = MockTransport::new();
        let mut scope = connected(&mock);
        scope
            .set_trigger(TriggerMode::Edge, Channel::Ch3, TriggerSlope::Positive, 1.5)
            .unwrap();
        assert_eq!(
            mock.sent(),
            vec![
                ":TRIG:MODE EDGE",
                ":TRIG:EDGE:SOUR CHAN3",
                ":TRIG:EDGE:SLOP POS",
                ":TRIG:LEV CHAN3,1.5",
            ]
        );
    }

    #[test]
    fn test_trigger_while_disconnected_sends_nothing() {
        let mock = MockTransport::new();
        let mut scope = ScopeSession::new(mock.clone());
        let result = scope.set_trigger(TriggerMode::Pulse, Channel::Ch1, TriggerSlope::Negative, 0.0);
        assert!(matches!(result, Err(ScopeError::NotConnected)));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_trigger_reports_first_failure_and_stops() {
        let mock = MockTransport::new().fail_on(":TRIG:EDGE:SLOP NEG");
        let mut scope = connected(&mock);
        let err = scope
            .apply_trigger(&TriggerConfig {
                mode: TriggerMode::Edge,
                source: Channel::Ch1,
                slope: TriggerSlope::Negative,
                level: -0.5,
            })
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(
            mock.sent(),
            vec![":TRIG:MODE EDGE", ":TRIG:EDGE:SOUR CHAN1", ":TRIG:EDGE:SLOP NEG"]
        );
    }

    #[test]
    fn test_trigger_level_must_be_finite() {
        let mock = MockTransport::new();
        let mut scope = connected(&mock);
        assert!(matches!(
            scope.set_trigger(TriggerMode::Edge, Channel::Ch1, TriggerSlope::Positive, f64::NAN),
            Err(ScopeError::InvalidArgument(_))
        ));
        assert_eq!(mock.call_count(), 0);
    }
}
