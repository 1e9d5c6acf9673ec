use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Failed to connect to {resource}: {reason}")]
    Connection { resource: String, reason: String },
    #[error("Oscilloscope not connected")]
    NotConnected,
    #[error("IO error: {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("Connection timeout: {0}")]
    Timeout(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ScopeError {
    /// Wrap an I/O failure on an open link, keeping timeouts distinguishable.
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        let context = context.into();
        match source.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                ScopeError::Timeout(context)
            }
            _ => ScopeError::Io { source, context },
        }
    }

    /// True for failures of the underlying link rather than of the reply contents.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScopeError::Io { .. } | ScopeError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kind_maps_to_timeout() {
        let err = ScopeError::io(
            std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"),
            "Reading reply to *IDN?",
        );
        assert!(matches!(err, ScopeError::Timeout(_)));
        assert!(err.is_transport());
    }

    #[test]
    fn test_other_io_kind_keeps_source() {
        let err = ScopeError::io(
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"),
            "Writing :WAV:DATA?",
        );
        assert!(matches!(err, ScopeError::Io { .. }));
        assert!(err.to_string().contains("Writing :WAV:DATA?"));
    }
}
