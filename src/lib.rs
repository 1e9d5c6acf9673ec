pub mod config;
pub mod error;
pub mod plotting;
pub mod scope;
pub mod types;
pub mod waveform;

pub use error::ScopeError;
pub use plotting::plot_waveform;
pub use scope::{
    Command, ConnectionConfig, InstrumentHandle, InstrumentLink, Query, ScopeSession,
    SocketResource, TcpTransport, Transport,
};
pub use types::{
    Channel, ScopeSettings, TriggerConfig, TriggerMode, TriggerSlope, WaveformFormat,
    WaveformMode,
};
pub use waveform::{decode, Preamble, WaveformSamples};
