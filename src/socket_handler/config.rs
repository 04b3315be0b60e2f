//! Configuration structures consumed by the socket handler.
//!
//! `SocketHandlerBuilder` constructs these values before passing them to
//! [`SocketHandler`](super::SocketHandler) for runtime use; the handler's
//! setters mutate the [`TransportConfig`] it owns afterwards.

use std::{
    fmt,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs},
    str::FromStr,
    time::Duration,
};

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Port logstash's `tcp`/`udp` inputs conventionally listen on.
pub const DEFAULT_PORT: u16 = 4560;
/// Minimum time between reconnect attempts once failures start piling up.
pub const RECONNECT_COOLDOWN: Duration = Duration::from_millis(5000);
/// Default timeout for establishing a connection (and the TLS handshake).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Socket flavour used to reach the collector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    /// TLS over TCP.
    TlsTcp,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown protocol {0:?}; expected tcp, udp or tls_tcp")]
pub struct ParseProtocolError(pub String);

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::TlsTcp => "tls_tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "tls_tcp" | "ssl_tcp" | "tls" => Ok(Self::TlsTcp),
            _ => Err(ParseProtocolError(s.to_owned())),
        }
    }
}

/// TLS connection options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// Domain presented during the handshake; defaults to the configured host.
    pub domain: Option<String>,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

/// Where and how the handler connects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Host name as configured; used for TLS server name checks.
    pub host: String,
    /// Resolved address of `host`.
    pub address: IpAddr,
    pub port: u16,
    pub protocol: Protocol,
    pub tls: TlsOptions,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(Protocol::Tcp, IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT)
    }
}

impl TransportConfig {
    /// Configuration targeting an already resolved address.
    pub fn new(protocol: Protocol, address: IpAddr, port: u16) -> Self {
        Self {
            host: address.to_string(),
            address,
            port,
            protocol,
            tls: TlsOptions::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Resolve `host` and build a configuration targeting it.
    pub fn resolve(protocol: Protocol, host: &str, port: u16) -> io::Result<Self> {
        let address = resolve_host(host)?;
        Ok(Self {
            host: host.to_owned(),
            ..Self::new(protocol, address, port)
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Name checked against the server certificate.
    pub fn tls_domain(&self) -> &str {
        self.tls
            .domain
            .as_deref()
            .filter(|domain| !domain.trim().is_empty())
            .unwrap_or(&self.host)
    }
}

/// Look up the first address for `host`.
pub fn resolve_host(host: &str) -> io::Result<IpAddr> {
    (host, 0)
        .to_socket_addrs()?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for host {host}"),
            )
        })
}

/// Configuration object describing how to construct a
/// [`SocketHandler`](super::SocketHandler).
#[derive(Clone, Debug)]
pub struct SocketHandlerConfig {
    pub transport: TransportConfig,
    /// Character set applied to text before it reaches the socket.
    pub encoding: &'static Encoding,
    /// Flush after every record rather than only on [`flush`](super::SocketHandler::flush).
    pub auto_flush: bool,
    pub warn_interval: Duration,
}

impl Default for SocketHandlerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            encoding: UTF_8,
            auto_flush: true,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl SocketHandlerConfig {
    /// Override the transport configuration.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}
