use log::{debug, info, warn};

use super::protocol::{Command, Protocol, Query};
use super::transport::{InstrumentLink, Transport};
use crate::error::ScopeError;
use crate::types::ScopeSettings;

pub mod channel;
pub mod timebase;
pub mod trigger;
pub mod waveform;

/// An open connection owned by exactly one session
#[derive(Debug)]
pub struct InstrumentHandle<L> {
    resource: String,
    identity: String,
    link: L,
}

impl<L> InstrumentHandle<L> {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

#[derive(Debug)]
enum SessionState<L> {
    Disconnected,
    Connected(InstrumentHandle<L>),
}

/// Command/response client for a bench oscilloscope.
///
/// `ScopeSession` translates typed configuration intents into the
/// instrument's SCPI vocabulary, reads scalar replies and fetches waveforms.
/// It holds at most one open link; every operation other than
/// [`connect`](Self::connect) and [`disconnect`](Self::disconnect) requires a
/// connection and fails with [`ScopeError::NotConnected`] without touching the
/// transport otherwise.
///
/// The session does no locking. Callers that configure and acquire from
/// several places must serialize access to one session themselves.
///
/// # Examples
///
/// ```no_run
/// use rusty_scope::{Channel, ScopeSession, TcpTransport};
///
/// let mut scope = ScopeSession::new(TcpTransport::default());
/// let idn = scope.connect("TCPIP0::192.168.1.100::5555::SOCKET")?;
/// println!("Connected to {idn}");
///
/// scope.set_timebase(200e-6)?;
/// scope.set_voltage_scale(Channel::Ch1, 1.0)?;
/// let waveform = scope.query_waveform(Channel::Ch1)?;
/// println!("{} points", waveform.len());
///
/// scope.disconnect();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ScopeSession<T: Transport> {
    transport: T,
    state: SessionState<T::Link>,
    strict_point_count: bool,
}

impl<T: Transport> ScopeSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
            strict_point_count: false,
        }
    }

    /// Reject waveforms whose byte count differs from the preamble's point count
    pub fn with_strict_point_count(mut self, strict: bool) -> Self {
        self.strict_point_count = strict;
        self
    }

    pub fn set_strict_point_count(&mut self, strict: bool) {
        self.strict_point_count = strict;
    }

    pub fn strict_point_count(&self) -> bool {
        self.strict_point_count
    }

    /// Open `resource` and return the instrument's identity string.
    ///
    /// An already open link is closed first. On failure the session stays
    /// disconnected.
    ///
    /// # Errors
    /// `ScopeError::Connection` if the transport cannot open the resource or
    /// the identity query fails.
    pub fn connect(&mut self, resource: &str) -> Result<String, ScopeError> {
        self.disconnect();

        let connection_error = |e: ScopeError| match e {
            ScopeError::Connection { .. } => e,
            other => ScopeError::Connection {
                resource: resource.to_string(),
                reason: other.to_string(),
            },
        };

        let mut link = self.transport.open(resource).map_err(connection_error)?;

        let query = Query::Identity.to_string();
        let identity = match link.query(&query) {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                if let Err(close_err) = link.close() {
                    debug!("Ignoring close failure after identity error: {close_err}");
                }
                return Err(connection_error(e));
            }
        };

        info!("Connected to {identity}");
        self.state = SessionState::Connected(InstrumentHandle {
            resource: resource.to_string(),
            identity: identity.clone(),
            link,
        });
        Ok(identity)
    }

    /// Close the link if one is open. Never fails; calling it while
    /// disconnected does nothing.
    pub fn disconnect(&mut self) {
        match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Connected(mut handle) => {
                if let Err(e) = handle.link.close() {
                    warn!("Error while closing {}: {e}", handle.resource);
                }
                info!("Disconnected from {}", handle.resource);
            }
            SessionState::Disconnected => {}
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    pub fn handle(&self) -> Option<&InstrumentHandle<T::Link>> {
        match &self.state {
            SessionState::Connected(handle) => Some(handle),
            SessionState::Disconnected => None,
        }
    }

    /// Identity string reported at connect time
    pub fn identity(&self) -> Option<&str> {
        self.handle().map(InstrumentHandle::identity)
    }

    pub fn resource(&self) -> Option<&str> {
        self.handle().map(InstrumentHandle::resource)
    }

    /// Push a complete acquisition setup: source channel, timebase,
    /// vertical scale and trigger, stopping at the first failure.
    pub fn apply_settings(&mut self, settings: &ScopeSettings) -> Result<(), ScopeError> {
        self.set_channel(settings.channel)?;
        self.set_timebase(settings.timebase)?;
        self.set_voltage_scale(settings.channel, settings.volts_per_div)?;
        self.apply_trigger(&settings.trigger)?;
        debug!("Applied settings {settings:?}");
        Ok(())
    }

    fn link(&mut self) -> Result<&mut T::Link, ScopeError> {
        match &mut self.state {
            SessionState::Connected(handle) => Ok(&mut handle.link),
            SessionState::Disconnected => Err(ScopeError::NotConnected),
        }
    }

    /// Run one exchange on the open link. A transport failure leaves the
    /// reply stream out of step with the requests, so the session closes the
    /// link and returns to disconnected.
    fn round_trip<R>(
        &mut self,
        exchange: impl FnOnce(&mut T::Link) -> Result<R, ScopeError>,
    ) -> Result<R, ScopeError> {
        let result = exchange(self.link()?);
        if let Err(e) = &result {
            if e.is_transport() {
                warn!("Link failure, dropping connection: {e}");
                self.disconnect();
            }
        }
        result
    }

    pub(crate) fn ensure_connected(&self) -> Result<(), ScopeError> {
        match self.state {
            SessionState::Connected(_) => Ok(()),
            SessionState::Disconnected => Err(ScopeError::NotConnected),
        }
    }

    pub(crate) fn send(&mut self, command: Command) -> Result<(), ScopeError> {
        let text = command.to_string();
        debug!("-> {text}");
        self.round_trip(|link| link.write(&text))
    }

    pub(crate) fn ask(&mut self, query: Query) -> Result<String, ScopeError> {
        let text = query.to_string();
        let reply = self.round_trip(|link| link.query(&text))?;
        debug!("{text} -> {}", reply.trim());
        Ok(reply)
    }

    pub(crate) fn ask_f64(&mut self, query: Query) -> Result<f64, ScopeError> {
        let reply = self.ask(query)?;
        Protocol::parse_f64(&reply, query)
    }

    pub(crate) fn ask_binary(&mut self, query: Query) -> Result<Vec<u8>, ScopeError> {
        let text = query.to_string();
        let block = self.round_trip(|link| link.query_binary(&text))?;
        debug!("{text} -> {} byte block", block.len());
        Ok(block)
    }
}

impl<T: Transport> Drop for ScopeSession<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

pub(crate) fn require_positive(value: f64, what: &str) -> Result<f64, ScopeError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ScopeError::InvalidArgument(format!(
            "{what} must be a positive number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::mock::{Call, MockTransport};
    use crate::types::{Channel, TriggerConfig, TriggerMode, TriggerSlope};

    const RESOURCE: &str = "TCPIP0::10.0.0.2::5555::SOCKET";

    #[test]
    fn test_connect_returns_identity() {
        let mock = MockTransport::new();
        let mut scope = ScopeSession::new(mock.clone());
        let idn = scope.connect(RESOURCE).unwrap();
        assert!(idn.starts_with("RIGOL TECHNOLOGIES"));
        assert!(scope.is_connected());
        assert_eq!(scope.resource(), Some(RESOURCE));
        assert_eq!(scope.identity(), Some(idn.as_str()));
        assert_eq!(
            mock.calls(),
            vec![Call::Open(RESOURCE.to_string()), Call::Query("*IDN?".to_string())]
        );
    }

    #[test]
    fn test_connect_refused_stays_disconnected() {
        let mock = MockTransport::new().refuse_open();
        let mut scope = ScopeSession::new(mock);
        assert!(matches!(
            scope.connect(RESOURCE),
            Err(ScopeError::Connection { .. })
        ));
        assert!(!scope.is_connected());
    }

    #[test]
    fn test_identity_failure_is_connection_error_and_closes_link() {
        let mock = MockTransport::new().fail_on("*IDN?");
        let mut scope = ScopeSession::new(mock.clone());
        let err = scope.connect(RESOURCE).unwrap_err();
        assert!(matches!(err, ScopeError::Connection { .. }));
        assert!(!scope.is_connected());
        assert_eq!(mock.calls().last(), Some(&Call::Close));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mock = MockTransport::new();
        let mut scope = ScopeSession::new(mock.clone());
        scope.disconnect();
        scope.connect(RESOURCE).unwrap();
        scope.disconnect();
        scope.disconnect();
        assert!(!scope.is_connected());
        let closes = mock.calls().iter().filter(|c| **c == Call::Close).count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn test_reconnect_closes_previous_link() {
        let mock = MockTransport::new();
        let mut scope = ScopeSession::new(mock.clone());
        scope.connect(RESOURCE).unwrap();
        scope.connect("10.0.0.3").unwrap();
        assert_eq!(scope.resource(), Some("10.0.0.3"));
        assert_eq!(mock.calls()[2], Call::Close);
    }

    #[test]
    fn test_drop_releases_link() {
        let mock = MockTransport::new();
        {
            let mut scope = ScopeSession::new(mock.clone());
            scope.connect(RESOURCE).unwrap();
        }
        assert_eq!(mock.calls().last(), Some(&Call::Close));
    }

    #[test]
    fn test_operations_require_connection() {
        let mock = MockTransport::new();
        let mut scope = ScopeSession::new(mock.clone());
        assert!(matches!(scope.set_channel(Channel::Ch1), Err(ScopeError::NotConnected)));
        assert!(matches!(scope.set_timebase(1e-3), Err(ScopeError::NotConnected)));
        assert!(matches!(
            scope.set_voltage_scale(Channel::Ch2, 0.5),
            Err(ScopeError::NotConnected)
        ));
        assert!(matches!(
            scope.apply_settings(&ScopeSettings::default()),
            Err(ScopeError::NotConnected)
        ));
        assert!(matches!(scope.timebase(), Err(ScopeError::NotConnected)));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_apply_settings_order() {
        let mock = MockTransport::new();
        let mut scope = ScopeSession::new(mock.clone());
        scope.connect(RESOURCE).unwrap();
        mock.clear_calls();

        let settings = ScopeSettings {
            channel: Channel::Ch2,
            timebase: 0.001,
            volts_per_div: 0.5,
            trigger: TriggerConfig {
                mode: TriggerMode::Edge,
                source: Channel::Ch2,
                slope: TriggerSlope::Negative,
                level: 0.25,
            },
        };
        scope.apply_settings(&settings).unwrap();
        assert_eq!(
            mock.sent(),
            vec![
                ":WAV:SOUR CHAN2",
                ":TIM:SCAL 0.001",
                ":CHAN2:SCAL 0.5",
                ":TRIG:MODE EDGE",
                ":TRIG:EDGE:SOUR CHAN2",
                ":TRIG:EDGE:SLOP NEG",
                ":TRIG:LEV CHAN2,0.25",
            ]
        );
    }

    #[test]
    fn test_apply_settings_stops_at_first_failure() {
        let mock = MockTransport::new().fail_on(":TIM:SCAL 0.0002");
        let mut scope = ScopeSession::new(mock.clone());
        scope.connect(RESOURCE).unwrap();
        mock.clear_calls();

        let err = scope.apply_settings(&ScopeSettings::default()).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(mock.sent(), vec![":WAV:SOUR CHAN1", ":TIM:SCAL 0.0002"]);
    }

    #[test]
    fn test_link_failure_drops_connection() {
        let mock = MockTransport::new().fail_on(":TIM:SCAL?");
        let mut scope = ScopeSession::new(mock.clone());
        scope.connect(RESOURCE).unwrap();
        mock.clear_calls();

        assert!(scope.timebase().unwrap_err().is_transport());
        assert!(!scope.is_connected());
        assert_eq!(
            mock.calls(),
            vec![Call::Query(":TIM:SCAL?".to_string()), Call::Close]
        );

        // Nothing further reaches the stale link
        assert!(matches!(scope.timebase(), Err(ScopeError::NotConnected)));
        assert_eq!(mock.call_count(), 2);

        scope.connect(RESOURCE).unwrap();
        assert!(scope.is_connected());
    }

    #[test]
    fn test_reply_errors_keep_connection() {
        let mock = MockTransport::new().reply(":TIM:SCAL?", "not-a-number");
        let mut scope = ScopeSession::new(mock);
        scope.connect(RESOURCE).unwrap();
        assert!(matches!(scope.timebase(), Err(ScopeError::Protocol(_))));
        assert!(scope.is_connected());
    }
}
