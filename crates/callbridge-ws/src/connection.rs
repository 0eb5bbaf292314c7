//! Blocking client connection: TCP (optionally through a forward proxy and
//! TLS), the opening handshake, and framed steady-state traffic.
//!
//! Reads come back one frame or one message at a time; control frames are
//! absorbed along the way unless the connection is mid-close. Writes go out
//! in bounded chunks. A read timeout is recoverable as long as the socket
//! still accepts a ping write; everything else tears the connection down.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::TlsConnector;
use tracing::{debug, trace};
use url::Url;

use crate::error::{WsError, WsResult};
use crate::frame::{Frame, FrameDecoder, OpCode};
use crate::handshake::{self, HttpResponseHead};
use crate::message::{IncomingMessage, MessageKind, OutgoingMessage};

/// Socket read and write chunk size.
const IO_CHUNK_LEN: usize = 8192;

/// TCP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default socket read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// URL scheme selecting transport security and proxying.
///
/// The trailing `p` routes the connection through a forward proxy with an
/// HTTP `CONNECT` tunnel before anything WebSocket happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Ws,
    Wss,
    Wsp,
    Wssp,
}

impl Scheme {
    pub fn parse(scheme: &str) -> WsResult<Self> {
        match scheme {
            "ws" => Ok(Self::Ws),
            "wss" => Ok(Self::Wss),
            "wsp" => Ok(Self::Wsp),
            "wssp" => Ok(Self::Wssp),
            other => Err(WsError::invalid_url(format!(
                "unsupported scheme {other:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
            Self::Wsp => "wsp",
            Self::Wssp => "wssp",
        }
    }

    pub fn uses_tls(&self) -> bool {
        matches!(self, Self::Wss | Self::Wssp)
    }

    pub fn uses_proxy(&self) -> bool {
        matches!(self, Self::Wsp | Self::Wssp)
    }
}

/// Parsed WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Parses a `ws`/`wss`/`wsp`/`wssp` URL.
    ///
    /// The port defaults to 80, or 443 on the TLS schemes; the path
    /// defaults to `/`.
    pub fn parse(raw: &str) -> WsResult<Self> {
        let url =
            Url::parse(raw).map_err(|e| WsError::invalid_url(format!("{raw:?}: {e}")))?;
        let scheme = Scheme::parse(url.scheme())?;
        let host = url
            .host_str()
            .ok_or_else(|| WsError::invalid_url(format!("{raw:?}: missing host")))?
            .to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if scheme.uses_tls() { 443 } else { 80 });
        let path = match url.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };
        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }
}

/// Forward proxy address, required by the `wsp`/`wssp` schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddr {
    pub host: String,
    pub port: u16,
}

/// Builder that dials an [`Endpoint`] and upgrades it to a [`Connection`].
#[derive(Debug)]
pub struct Connector {
    endpoint: Endpoint,
    headers: Vec<(String, String)>,
    proxy: Option<ProxyAddr>,
    read_timeout: Duration,
}

impl Connector {
    pub fn new(url: &str) -> WsResult<Self> {
        Ok(Self {
            endpoint: Endpoint::parse(url)?,
            headers: Vec::new(),
            proxy: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Adds a header to the upgrade request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the forward proxy to tunnel through.
    pub fn proxy(mut self, proxy: ProxyAddr) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the socket read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Dials the endpoint, tunnels and wraps in TLS as the scheme demands,
    /// performs the opening handshake and returns the live connection.
    pub fn connect(self) -> WsResult<Connection<Transport>> {
        let Endpoint {
            scheme,
            host,
            port,
            path: _,
        } = &self.endpoint;

        let (dial_host, dial_port) = if scheme.uses_proxy() {
            let proxy = self.proxy.as_ref().ok_or_else(|| {
                WsError::proxy(format!(
                    "scheme {:?} requires a proxy address",
                    scheme.as_str()
                ))
            })?;
            (proxy.host.as_str(), proxy.port)
        } else {
            (host.as_str(), *port)
        };

        debug!(
            scheme = scheme.as_str(),
            host = %host,
            port,
            "connecting"
        );
        let mut tcp = open_tcp(dial_host, dial_port)?;
        tcp.set_read_timeout(Some(self.read_timeout))?;

        // The CONNECT exchange happens in the clear, before any TLS.
        if scheme.uses_proxy() {
            establish_tunnel(&mut tcp, host, *port)?;
        }

        let mut transport = if scheme.uses_tls() {
            let connector = TlsConnector::new()?;
            let tls = connector.connect(host, tcp).map_err(|e| match e {
                native_tls::HandshakeError::Failure(err) => WsError::Tls(err),
                native_tls::HandshakeError::WouldBlock(_) => {
                    WsError::broken("TLS handshake interrupted")
                }
            })?;
            Transport::Tls(Box::new(tls))
        } else {
            Transport::Plain(tcp)
        };

        let key = handshake::generate_key();
        let surplus = upgrade(&mut transport, &self.endpoint, &key, &self.headers)?;
        debug!("websocket handshake accepted");

        let mut connection = Connection::from_stream(transport);
        connection.decoder.feed(&surplus);
        Ok(connection)
    }
}

/// Established transport under a connection, plain or TLS.
#[derive(Debug)]
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<native_tls::TlsStream<TcpStream>>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

fn open_tcp(host: &str, port: u16) -> WsResult<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| WsError::broken(format!("resolving {host}:{port} failed: {e}")))?;
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => WsError::broken(format!("connecting to {host}:{port} failed: {e}")),
        None => WsError::broken(format!("{host}:{port} resolved to no addresses")),
    })
}

/// Asks the proxy to open a tunnel to the real endpoint.
fn establish_tunnel<S: Read + Write>(stream: &mut S, host: &str, port: u16) -> WsResult<()> {
    let request = format!("CONNECT {host}:{port} HTTP/1.0\r\n\r\n");
    write_chunked(stream, request.as_bytes()).map_err(WsError::proxy)?;

    let (head, _) = read_head_blob(stream)
        .map_err(|e| WsError::proxy(format!("reading CONNECT response failed: {e}")))?;
    let response = HttpResponseHead::parse(&head)
        .map_err(|e| WsError::proxy(format!("invalid CONNECT response: {e}")))?;
    if response.status != 200 {
        return Err(WsError::proxy(format!(
            "tunnel refused: {} {}",
            response.status, response.reason
        )));
    }
    debug!(host, port, "proxy tunnel established");
    Ok(())
}

/// Performs the opening handshake on an established transport.
///
/// Returns whatever bytes followed the response head; the server may start
/// sending frames before we look at its answer.
fn upgrade<S: Read + Write>(
    stream: &mut S,
    endpoint: &Endpoint,
    key: &str,
    headers: &[(String, String)],
) -> WsResult<Vec<u8>> {
    let request = handshake::build_request(
        &endpoint.path,
        &endpoint.host,
        endpoint.port,
        key,
        headers,
    );
    write_chunked(stream, request.as_bytes()).map_err(WsError::handshake)?;

    let (head, surplus) = read_head_blob(stream)
        .map_err(|e| WsError::handshake(format!("reading handshake response failed: {e}")))?;
    let response = HttpResponseHead::parse(&head)?;
    handshake::verify_response(&response, key)?;
    Ok(surplus)
}

/// Reads an HTTP response head off the stream.
///
/// Returns the text before the blank line and the raw bytes after it.
fn read_head_blob<S: Read>(stream: &mut S) -> io::Result<(String, Vec<u8>)> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; IO_CHUNK_LEN];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).into_owned();
            let surplus = buf[end + 4..].to_vec();
            return Ok((head, surplus));
        }
        match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before the response head ended",
                ));
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

fn write_chunked<S: Write>(stream: &mut S, data: &[u8]) -> Result<(), String> {
    let mut rest = data;
    while !rest.is_empty() {
        let take = rest.len().min(IO_CHUNK_LEN);
        match stream.write(&rest[..take]) {
            Ok(0) => return Err("zero bytes written to socket".to_string()),
            Ok(n) => rest = &rest[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(format!("writing to socket failed: {e}")),
        }
    }
    stream
        .flush()
        .map_err(|e| format!("flushing socket failed: {e}"))
}

/// An upgraded client connection over any blocking byte stream.
///
/// All outgoing frames are masked, as the client side of the protocol
/// requires. Once torn down the connection stays closed; a fresh one comes
/// from a new [`Connector`].
#[derive(Debug)]
pub struct Connection<S> {
    stream: Option<S>,
    decoder: FrameDecoder,
    handle_control: bool,
}

impl<S: Read + Write> Connection<S> {
    /// Wraps a stream on which the handshake has already succeeded.
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream: Some(stream),
            decoder: FrameDecoder::new(),
            handle_control: true,
        }
    }

    /// Connection liveness.
    ///
    /// With `probe` a ping goes out to exercise the socket; there is no
    /// wait for the pong. Without it only local state is consulted.
    pub fn is_connected(&mut self, probe: bool) -> bool {
        if self.stream.is_none() {
            return false;
        }
        if !probe {
            return true;
        }
        self.probe()
    }

    /// Sends a text message, fragmenting large payloads.
    pub fn send_text(&mut self, data: impl Into<Vec<u8>>) -> WsResult<()> {
        self.send_message(&OutgoingMessage::text(data)?)
    }

    /// Writes every frame of an assembled message, in order.
    pub fn send_message(&mut self, message: &OutgoingMessage) -> WsResult<()> {
        for frame in message.frames() {
            self.write_frame(frame.clone())?;
        }
        Ok(())
    }

    /// Encodes and writes one frame, masked with a fresh key.
    pub fn write_frame(&mut self, frame: Frame) -> WsResult<()> {
        self.write_raw(&frame.masked().encode())
    }

    /// Reads one whole message, reassembling fragments.
    pub fn read_message(&mut self) -> WsResult<(MessageKind, Vec<u8>)> {
        let mut message = IncomingMessage::new();
        while !message.is_ready() {
            let frame = self.read_frame()?;
            if let Err(e) = message.push_frame(frame) {
                let _ = self.write_close("invalid frame sequence received");
                self.teardown();
                return Err(WsError::broken(format!("invalid frame sequence: {e}")));
            }
        }
        message.into_parts()
    }

    /// Reads the next frame.
    ///
    /// With control handling on (the default) pings are answered, pongs
    /// skipped, and a remote close confirmed and surfaced as
    /// [`WsError::CloseReceived`]; only data frames come back.
    pub fn read_frame(&mut self) -> WsResult<Frame> {
        loop {
            let frame = self.next_raw_frame()?;
            if !self.handle_control {
                return Ok(frame);
            }
            match frame.opcode() {
                OpCode::Close => {
                    debug!(
                        reason = %String::from_utf8_lossy(frame.payload()),
                        "remote close received"
                    );
                    self.confirm_remote_close();
                    return Err(WsError::CloseReceived);
                }
                OpCode::Ping => {
                    trace!(payload_len = frame.len(), "answering ping");
                    let pong = Frame::pong(frame.into_payload())?;
                    self.write_frame(pong)?;
                }
                OpCode::Pong => {
                    trace!("pong skipped");
                }
                _ => return Ok(frame),
            }
        }
    }

    /// Closes the connection, offering the peer the closing handshake.
    ///
    /// A close frame goes out and incoming frames are drained until the
    /// peer answers with its own close. Errors along the way are ignored;
    /// the socket is dropped either way.
    pub fn close(&mut self, message: &str) {
        if self.stream.is_none() {
            return;
        }
        debug!(message, "closing connection");
        if self.write_close(message).is_ok() {
            self.handle_control = false;
            loop {
                match self.next_raw_frame() {
                    Ok(frame) if frame.opcode() == OpCode::Close => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            self.handle_control = true;
        }
        self.teardown();
    }

    /// Drops the socket without any closing handshake.
    pub fn hard_close(&mut self) {
        self.teardown();
    }

    /// Next frame off the decoder, reading more bytes as needed.
    fn next_raw_frame(&mut self) -> WsResult<Frame> {
        loop {
            match self.decoder.try_next() {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => {
                    let _ = self.write_close("invalid frame received");
                    self.teardown();
                    return Err(WsError::broken(format!("invalid frame received: {e}")));
                }
            }
            self.fill_read_buffer()?;
        }
    }

    /// One socket read into the decoder, with the liveness policy applied.
    ///
    /// A timeout is recoverable while a ping still goes through. EOF is
    /// final: the read side is closed, so no frame can ever arrive, no
    /// matter what the write side still accepts.
    fn fill_read_buffer(&mut self) -> WsResult<()> {
        let mut chunk = [0u8; IO_CHUNK_LEN];
        loop {
            let result = {
                let stream = self
                    .stream
                    .as_mut()
                    .ok_or_else(|| WsError::broken("connection is closed"))?;
                stream.read(&mut chunk)
            };
            match result {
                Ok(0) => {
                    self.teardown();
                    return Err(WsError::broken("socket EOF reached"));
                }
                Ok(n) => {
                    self.decoder.feed(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    if !self.probe() {
                        self.teardown();
                        return Err(WsError::broken("read timeout with unresponsive socket"));
                    }
                    return Err(WsError::Timeout);
                }
                Err(e) => {
                    self.teardown();
                    return Err(WsError::broken(format!("reading from socket failed: {e}")));
                }
            }
        }
    }

    /// Liveness probe: a ping write with no wait for the pong.
    fn probe(&mut self) -> bool {
        match Frame::ping(Vec::new()) {
            Ok(frame) => self.write_frame(frame).is_ok(),
            Err(_) => false,
        }
    }

    /// Confirms a close the peer initiated, then drops the socket.
    fn confirm_remote_close(&mut self) {
        let _ = self.write_close("Confirm connection close");
        self.teardown();
    }

    fn write_close(&mut self, message: &str) -> WsResult<()> {
        self.write_frame(Frame::close(message.as_bytes().to_vec())?)
    }

    /// Chunked write of raw bytes; any failure tears the connection down.
    fn write_raw(&mut self, data: &[u8]) -> WsResult<()> {
        let result = {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| WsError::broken("connection is closed"))?;
            write_chunked(stream, data)
        };
        if let Err(reason) = result {
            self.teardown();
            return Err(WsError::broken(reason));
        }
        Ok(())
    }

    fn teardown(&mut self) {
        self.stream = None;
        self.decoder.clear();
    }
}
