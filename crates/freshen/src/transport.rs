//! Byte-stream connections to the dashboard.
//!
//! The session only needs connect/send/recv/close, expressed by the
//! [`Connector`] and [`Connection`] traits. [`TcpConnector`] is the real
//! implementation, with rustls for `wss://` endpoints; tests substitute
//! scripted connectors.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::ServerName;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::ws::WsFrameDecodingError;

pub const DEFAULT_URL: &str = "wss://dash.freshen.cc/api/v2/rpc";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// How long `recv` waits for data before reporting none.
pub const DEFAULT_RECV_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported URL scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),
    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),
    #[error("{host}:{port} did not resolve")]
    Unresolved { host: String, port: u16 },
    #[error("connection closed by peer")]
    Closed,
    #[error("input buffer overflow")]
    BufferFull,
    #[error("websocket close received")]
    CloseReceived,
    #[error(transparent)]
    Frame(#[from] WsFrameDecodingError),
    #[error(transparent)]
    Tls(#[from] rustls::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Where to connect and what to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    /// Request target: path plus query.
    pub uri: String,
}

impl Endpoint {
    /// Parses a `ws://` or `wss://` URL. Ports default to 80 and 443.
    ///
    /// # Example
    ///
    /// ```
    /// use freshen::transport::Endpoint;
    ///
    /// let ep = Endpoint::parse("wss://dash.freshen.cc/api/v2/rpc").unwrap();
    /// assert!(ep.tls);
    /// assert_eq!((ep.host.as_str(), ep.port), ("dash.freshen.cc", 443));
    /// assert_eq!(ep.uri, "/api/v2/rpc");
    /// ```
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(url)?;
        let tls = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        };
        let host = url.host_str().ok_or(TransportError::MissingHost)?.to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if tls { 443 } else { 80 });
        let mut uri = url.path().to_string();
        if let Some(query) = url.query() {
            uri.push('?');
            uri.push_str(query);
        }
        Ok(Self {
            tls,
            host,
            port,
            uri,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "wss" } else { "ws" };
        write!(f, "{scheme}://{}:{}{}", self.host, self.port, self.uri)
    }
}

/// An open byte stream.
pub trait Connection {
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Waits a bounded time for data. `Ok(0)` means nothing arrived; a
    /// closed stream is an error.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn close(&mut self);
}

pub trait Connector {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError>;
}

/// Builds the rustls client configuration.
///
/// Trust anchors come from `ca_file` (PEM) when given, otherwise from the
/// bundled Mozilla roots.
pub fn tls_config(ca_file: Option<&Path>) -> Result<Arc<ClientConfig>, TransportError> {
    let roots = match ca_file {
        Some(path) => load_roots(path)?,
        None => webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect(),
    };
    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

fn load_roots(path: &Path) -> Result<RootCertStore, TransportError> {
    let mut roots = RootCertStore::empty();
    let mut reader = BufReader::new(File::open(path)?);
    for cert in rustls_pemfile::certs(&mut reader) {
        roots.add(cert?)?;
    }
    if roots.is_empty() {
        return Err(TransportError::NoCertificates(path.to_path_buf()));
    }
    Ok(roots)
}

/// TCP connector, TLS for `wss://`.
pub struct TcpConnector {
    tls: Arc<ClientConfig>,
    connect_timeout: Duration,
    recv_wait: Duration,
}

impl TcpConnector {
    pub fn new(tls: Arc<ClientConfig>) -> Self {
        Self {
            tls,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            recv_wait: DEFAULT_RECV_WAIT,
        }
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, recv_wait: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.recv_wait = recv_wait;
        self
    }

    fn open_socket(&self, endpoint: &Endpoint) -> Result<TcpStream, TransportError> {
        let mut last_err = None;
        for addr in (endpoint.host.as_str(), endpoint.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(sock) => {
                    debug!(%addr, "tcp connected");
                    sock.set_nodelay(true)?;
                    sock.set_read_timeout(Some(self.recv_wait))?;
                    return Ok(sock);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => e.into(),
            None => TransportError::Unresolved {
                host: endpoint.host.clone(),
                port: endpoint.port,
            },
        })
    }
}

impl Connector for TcpConnector {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError> {
        let sock = self.open_socket(endpoint)?;
        if !endpoint.tls {
            return Ok(Box::new(TcpConnection::Plain(sock)));
        }
        let name = ServerName::try_from(endpoint.host.clone())
            .map_err(|_| TransportError::InvalidServerName(endpoint.host.clone()))?;
        let conn = ClientConnection::new(self.tls.clone(), name)?;
        let mut stream = StreamOwned::new(conn, sock);
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }
        debug!(host = %endpoint.host, "tls established");
        Ok(Box::new(TcpConnection::Tls(Box::new(stream))))
    }
}

enum TcpConnection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl TcpConnection {
    fn socket(&self) -> &TcpStream {
        match self {
            TcpConnection::Plain(sock) => sock,
            TcpConnection::Tls(stream) => &stream.sock,
        }
    }
}

impl Connection for TcpConnection {
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        match self {
            TcpConnection::Plain(sock) => {
                sock.write_all(data)?;
                sock.flush()?;
            }
            TcpConnection::Tls(stream) => {
                stream.write_all(data)?;
                stream.flush()?;
            }
        }
        Ok(data.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let read = match self {
            TcpConnection::Plain(sock) => sock.read(buf),
            TcpConnection::Tls(stream) => stream.read(buf),
        };
        match read {
            Ok(0) if !buf.is_empty() => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if let TcpConnection::Tls(stream) = self {
            stream.conn.send_close_notify();
            let _ = stream.conn.complete_io(&mut stream.sock);
        }
        let _ = self.socket().shutdown(Shutdown::Both);
    }
}
