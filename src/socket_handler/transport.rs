//! Transport primitives for the socket handler.
//!
//! Each [`Protocol`] has its own construction path. A failure to establish
//! the requested protocol is reported as an error; it never degrades to a
//! different protocol.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, UdpSocket},
};

use native_tls::{TlsConnector, TlsStream};

use super::config::{Protocol, TlsOptions, TransportConfig};

/// An established outbound stream.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    /// A connected datagram socket; every write is sent as one datagram.
    Udp(UdpSocket),
}

impl Connection {
    pub fn protocol(&self) -> Protocol {
        match self {
            Connection::Tcp(_) => Protocol::Tcp,
            Connection::Tls(_) => Protocol::TlsTcp,
            Connection::Udp(_) => Protocol::Udp,
        }
    }

    /// Signal end-of-stream to the peer.
    ///
    /// A peer that already went away is not an error here.
    pub fn shutdown(&mut self) -> io::Result<()> {
        let result = match self {
            Connection::Tcp(stream) => stream.shutdown(Shutdown::Write),
            Connection::Tls(stream) => stream.shutdown(),
            Connection::Udp(_) => Ok(()),
        };
        match result {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.write(buf),
            Connection::Tls(stream) => stream.write(buf),
            Connection::Udp(socket) => socket.send(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.flush(),
            Connection::Tls(stream) => stream.flush(),
            Connection::Udp(_) => Ok(()),
        }
    }
}

/// Establish a connection for the configured protocol.
pub fn open_connection(config: &TransportConfig) -> io::Result<Connection> {
    match config.protocol {
        Protocol::Tcp => connect_tcp(config).map(Connection::Tcp),
        Protocol::Udp => connect_udp(config).map(Connection::Udp),
        Protocol::TlsTcp => connect_tls(config).map(|stream| Connection::Tls(Box::new(stream))),
    }
}

fn connect_tcp(config: &TransportConfig) -> io::Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&config.socket_addr(), config.connect_timeout)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn connect_udp(config: &TransportConfig) -> io::Result<UdpSocket> {
    let target = config.socket_addr();
    let local: SocketAddr = if target.is_ipv4() {
        ([0u8; 4], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(local)?;
    socket.connect(target)?;
    Ok(socket)
}

fn tls_connector(options: &TlsOptions) -> io::Result<TlsConnector> {
    let mut builder = TlsConnector::builder();
    if options.insecure_skip_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    builder.build().map_err(io::Error::other)
}

fn connect_tls(config: &TransportConfig) -> io::Result<TlsStream<TcpStream>> {
    let connector = tls_connector(&config.tls)?;
    let stream = connect_tcp(config)?;
    // Bound the handshake by the connect timeout, then go back to blocking
    // writes with no timeout.
    stream.set_read_timeout(Some(config.connect_timeout))?;
    stream.set_write_timeout(Some(config.connect_timeout))?;
    let stream = connector
        .connect(config.tls_domain(), stream)
        .map_err(io::Error::other)?;
    let tcp = stream.get_ref();
    tcp.set_read_timeout(None)?;
    tcp.set_write_timeout(None)?;
    Ok(stream)
}
