use log::{debug, warn};
use std::io::{BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::protocol::{Protocol, TERMINATOR};
use crate::error::ScopeError;

/// Default port of the raw SCPI socket service on LXI instruments
pub const DEFAULT_SCPI_PORT: u16 = 5555;

/// One open, synchronous request/response channel to an instrument.
///
/// Every call is a blocking round trip; implementations never pipeline.
pub trait InstrumentLink {
    /// Send a command that produces no reply
    fn write(&mut self, command: &str) -> Result<(), ScopeError>;

    /// Send a query and return its text reply without the terminator
    fn query(&mut self, command: &str) -> Result<String, ScopeError>;

    /// Send a query whose reply is an arbitrary binary block and return the payload
    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, ScopeError>;

    /// Release the underlying connection
    fn close(&mut self) -> Result<(), ScopeError>;
}

/// Opens links to instruments by resource identifier.
///
/// Addressing, driver selection and timeouts are the transport's concern.
pub trait Transport {
    type Link: InstrumentLink;

    fn open(&mut self, resource: &str) -> Result<Self::Link, ScopeError>;
}

/// Connection configuration for the TCP socket transport.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rusty_scope::ConnectionConfig;
///
/// // Use default timeouts
/// let config = ConnectionConfig::default();
///
/// // Long waveform transfers over a slow network
/// let config = ConnectionConfig {
///     read_timeout: Duration::from_secs(30),
///     ..ConnectionConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Timeout for each read of a reply
    pub read_timeout: Duration,
    /// Timeout for writing a command
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Host and port parsed from a resource identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketResource {
    pub host: String,
    pub port: u16,
}

impl SocketResource {
    /// Accepts `TCPIP[n]::host::port::SOCKET`, `TCPIP[n]::host::INSTR`,
    /// `TCPIP[n]::host::inst0::INSTR`, `host[:port]` and `[ipv6][:port]`.
    ///
    /// `INSTR` forms are served over the raw socket port, not VXI-11.
    /// IPv6 literals must be bracketed; a bare `::1` reads as a VISA string.
    pub fn parse(resource: &str) -> Result<Self, ScopeError> {
        let unsupported = |reason: &str| ScopeError::Connection {
            resource: resource.to_string(),
            reason: reason.to_string(),
        };
        let resource = resource.trim();

        if let Some(rest) = resource.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| unsupported("unterminated IPv6 literal"))?;
            if host.is_empty() {
                return Err(unsupported("missing host"));
            }
            let port = match tail {
                "" => DEFAULT_SCPI_PORT,
                tail => tail
                    .strip_prefix(':')
                    .and_then(|port| port.parse::<u16>().ok())
                    .ok_or_else(|| unsupported("invalid port"))?,
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        if resource.contains("::") {
            let parts: Vec<&str> = resource.split("::").collect();
            if !parts[0].to_uppercase().starts_with("TCPIP") {
                return Err(unsupported("only TCPIP resources are supported by the socket transport"));
            }
            let host = parts.get(1).filter(|h| !h.is_empty()).ok_or_else(|| unsupported("missing host"))?;
            let suffix = parts.last().map(|s| s.to_uppercase()).unwrap_or_default();

            let port = match (parts.len(), suffix.as_str()) {
                (4, "SOCKET") => parts[2]
                    .parse::<u16>()
                    .map_err(|_| unsupported("invalid socket port"))?,
                (3, "INSTR") => DEFAULT_SCPI_PORT,
                (4, "INSTR") if parts[2].to_lowercase().starts_with("inst") => DEFAULT_SCPI_PORT,
                _ => return Err(unsupported("unrecognized TCPIP resource form")),
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match resource.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => Ok(Self {
                host: host.to_string(),
                port: port.parse::<u16>().map_err(|_| unsupported("invalid port"))?,
            }),
            Some(_) => Err(unsupported("missing host")),
            None if !resource.is_empty() => Ok(Self {
                host: resource.to_string(),
                port: DEFAULT_SCPI_PORT,
            }),
            None => Err(unsupported("empty resource")),
        }
    }
}

/// SCPI over a raw TCP socket, newline terminated
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: ConnectionConfig,
}

impl TcpTransport {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Transport for TcpTransport {
    type Link = TcpLink;

    fn open(&mut self, resource: &str) -> Result<TcpLink, ScopeError> {
        let target = SocketResource::parse(resource)?;
        let connection_error = |reason: String| ScopeError::Connection {
            resource: resource.to_string(),
            reason,
        };

        let socket_addr = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| connection_error(format!("cannot resolve {}: {e}", target.host)))?
            .next()
            .ok_or_else(|| connection_error(format!("no address for {}", target.host)))?;

        debug!("Connecting to instrument at {socket_addr}");

        let stream = TcpStream::connect_timeout(&socket_addr, self.config.connect_timeout)
            .map_err(|e| {
                warn!("Failed to connect to {socket_addr}: {e}");
                connection_error(e.to_string())
            })?;

        let configure = |stream: &TcpStream| -> std::io::Result<TcpStream> {
            stream.set_read_timeout(Some(self.config.read_timeout))?;
            stream.set_write_timeout(Some(self.config.write_timeout))?;
            stream.set_nodelay(true)?;
            stream.try_clone()
        };
        let reader = configure(&stream).map_err(|e| connection_error(e.to_string()))?;

        debug!("Socket open to {socket_addr}");

        Ok(TcpLink {
            stream,
            reader: BufReader::new(reader),
            out_of_sync: false,
        })
    }
}

/// Open socket to one instrument.
///
/// A failed exchange leaves the reply stream at an unknown position (a late
/// reply or the rest of a half-read block), so once one fails the link
/// refuses further round trips until it is reopened.
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    out_of_sync: bool,
}

impl TcpLink {
    pub fn is_usable(&self) -> bool {
        !self.out_of_sync
    }

    fn send(&mut self, command: &str) -> Result<(), ScopeError> {
        let mut message = Vec::with_capacity(command.len() + 1);
        message.extend_from_slice(command.as_bytes());
        message.push(TERMINATOR);
        self.stream
            .write_all(&message)
            .map_err(|e| ScopeError::io(e, format!("Writing {command}")))
    }

    fn exchange<R>(
        &mut self,
        command: &str,
        read: impl FnOnce(&mut BufReader<TcpStream>) -> Result<R, ScopeError>,
    ) -> Result<R, ScopeError> {
        if self.out_of_sync {
            return Err(ScopeError::io(
                ErrorKind::NotConnected.into(),
                format!("Link out of sync after an earlier failure, not sending {command}"),
            ));
        }
        let result = self.send(command).and_then(|()| read(&mut self.reader));
        if let Err(e) = &result {
            warn!("'{command}' failed, link is no longer usable: {e}");
            self.out_of_sync = true;
        }
        result
    }
}

impl InstrumentLink for TcpLink {
    fn write(&mut self, command: &str) -> Result<(), ScopeError> {
        self.exchange(command, |_| Ok(()))
    }

    fn query(&mut self, command: &str) -> Result<String, ScopeError> {
        self.exchange(command, |reader| Protocol::read_line(reader))
    }

    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, ScopeError> {
        self.exchange(command, |reader| Protocol::read_block(reader))
    }

    fn close(&mut self) -> Result<(), ScopeError> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => {
                Err(ScopeError::io(e, "Closing socket"))
            }
            _ => Ok(()),
        }
    }
}
