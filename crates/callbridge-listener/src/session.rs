//! The CTI session: request/response correlation and event intake over
//! one WebSocket connection.
//!
//! The session outlives individual connections. Attach a freshly dialed
//! connection after a reconnect and the correlation id sequence carries
//! on; requests left pending on the old connection are dropped, since
//! their responses can no longer arrive.
//!
//! On every scheme except TLS the server exchanges base64-wrapped
//! payloads, so the session wraps outbound XML and unwraps inbound
//! payloads before parsing.

use std::collections::HashMap;
use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use callbridge_core::{EventOutbox, EventRecord};
use callbridge_cti::{
    ClientIdentity, CtiMessage, CtiResult, EventKind, Method, Request, RequestIdGenerator,
    Response, client_guid, parse_message,
};
use callbridge_ws::{Connection, Connector, Transport, WsError};

use crate::config::ListenerConfig;
use crate::error::ListenerResult;

// The upstream server gates handshakes on this agent signature.
const AGENT: &str = "WebSocket++/0.2.0";
const AGENT_DEV: &str = "WebSocket++/0.2.0dev";

/// Which inbound message classes the session acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessMask(pub u8);

impl ProcessMask {
    pub const NONE: Self = Self(0);
    pub const EVENTS: Self = Self(1);
    pub const RESPONSES: Self = Self(2);
    pub const ALL: Self = Self(3);

    fn allows_events(&self) -> bool {
        self.0 & Self::EVENTS.0 != 0
    }

    fn allows_responses(&self) -> bool {
        self.0 & Self::RESPONSES.0 != 0
    }
}

/// Hook run when a response settles a request.
///
/// It always runs, success or failure, before the failure propagates to
/// the caller of [`CtiSession::receive`].
pub type ResponseCallback = Box<dyn FnOnce(&Request, &Response, &CtiResult<()>) + Send>;

struct PendingRequest {
    request: Request,
    callback: Option<ResponseCallback>,
}

/// Protocol state machine for one client identity.
pub struct CtiSession<S> {
    connection: Option<Connection<S>>,
    identity: ClientIdentity,
    ids: RequestIdGenerator,
    pending: HashMap<i64, PendingRequest>,
    outbox: EventOutbox,
    event_mask: u8,
    process_mask: ProcessMask,
    wire_base64: bool,
}

impl<S: Read + Write> CtiSession<S> {
    /// Creates a detached session; attach a connection before sending.
    pub fn new(
        identity: ClientIdentity,
        outbox: EventOutbox,
        event_mask: u8,
        wire_base64: bool,
    ) -> Self {
        Self {
            connection: None,
            identity,
            ids: RequestIdGenerator::default(),
            pending: HashMap::new(),
            outbox,
            event_mask,
            process_mask: ProcessMask::ALL,
            wire_base64,
        }
    }

    /// Adopts a dialed connection and the identity it was dialed with.
    ///
    /// Requests pending on the previous connection are dropped; their
    /// responses can only arrive on the socket that is gone.
    pub fn attach(&mut self, identity: ClientIdentity, connection: Connection<S>) {
        if !self.pending.is_empty() {
            debug!(
                count = self.pending.len(),
                "dropping requests pending on the previous connection"
            );
            self.pending.clear();
        }
        self.identity = identity;
        self.connection = Some(connection);
    }

    /// Connection liveness; see [`Connection::is_connected`] for `probe`.
    pub fn is_connected(&mut self, probe: bool) -> bool {
        self.connection
            .as_mut()
            .is_some_and(|connection| connection.is_connected(probe))
    }

    pub fn set_process_mask(&mut self, mask: ProcessMask) {
        self.process_mask = mask;
    }

    /// Sends a request and registers it for correlation.
    pub fn send_request(&mut self, method: Method) -> ListenerResult<i64> {
        self.send_request_with(method, None)
    }

    /// Sends a request with a callback to run when its response settles.
    pub fn send_request_with(
        &mut self,
        method: Method,
        callback: Option<ResponseCallback>,
    ) -> ListenerResult<i64> {
        let request = Request::new(self.ids.next_id(), self.identity.clone(), method);
        let xml = request.to_xml();
        debug!(target: "wire", dir = "out", payload = %xml);
        let payload = self.encode_wire(xml);
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| WsError::broken("no connection"))?;
        connection.send_text(payload)?;
        let id = request.id;
        self.pending.insert(id, PendingRequest { request, callback });
        Ok(id)
    }

    /// Subscribes to server events matching the configured mask.
    pub fn subscribe(&mut self) -> ListenerResult<i64> {
        let mask = self.event_mask;
        self.send_request_with(
            Method::GetEvents { event_mask: mask },
            Some(Box::new(move |_request, _response, result| match result {
                Ok(()) => debug!(mask, "event subscription acknowledged"),
                Err(error) => warn!(mask, %error, "event subscription refused"),
            })),
        )
    }

    /// Reads one message off the socket and acts on it.
    pub fn receive(&mut self) -> ListenerResult<()> {
        let payload = {
            let connection = self
                .connection
                .as_mut()
                .ok_or_else(|| WsError::broken("no connection"))?;
            let (_kind, payload) = connection.read_message()?;
            payload
        };
        let text = self.decode_wire(payload);
        debug!(target: "wire", dir = "inc", payload = %text);
        self.dispatch(&text)
    }

    /// Closes the connection, if one is attached.
    pub fn close(&mut self, reason: &str) {
        if let Some(mut connection) = self.connection.take() {
            connection.close(reason);
        }
    }

    /// Routes one decoded payload.
    ///
    /// Unrecognized and unparseable payloads are logged and skipped; a
    /// hostile or confused peer must not take the listener down.
    fn dispatch(&mut self, xml: &str) -> ListenerResult<()> {
        let message = match parse_message(xml) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("ignoring unrecognized message");
                return Ok(());
            }
            Err(error) => {
                warn!(%error, "discarding unparseable message");
                return Ok(());
            }
        };
        match message {
            CtiMessage::Event(record) => {
                if !self.process_mask.allows_events() {
                    debug!("event processing is masked off");
                    return Ok(());
                }
                self.accept_event(record)
            }
            CtiMessage::Response(response) => {
                if !self.process_mask.allows_responses() {
                    debug!("response processing is masked off");
                    return Ok(());
                }
                self.accept_response(response)
            }
        }
    }

    fn accept_event(&mut self, record: EventRecord) -> ListenerResult<()> {
        let kind = EventKind::of(&record);
        if !kind.matches_mask(self.event_mask) {
            debug!(
                ?kind,
                mask = self.event_mask,
                "event outside the subscription mask"
            );
            return Ok(());
        }
        self.outbox.push(&record)?;
        debug!(?kind, "event stored");
        Ok(())
    }

    fn accept_response(&mut self, response: Response) -> ListenerResult<()> {
        let Some(PendingRequest { request, callback }) =
            self.pending.remove(&response.request_id)
        else {
            debug!(
                request_id = response.request_id,
                "response for an unknown request"
            );
            return Ok(());
        };
        let result = self.handle_response(&request, &response);
        if let Some(callback) = callback {
            callback(&request, &response, &result);
        }
        result.map_err(Into::into)
    }

    /// Per-method handling of a settled response.
    fn handle_response(&self, request: &Request, response: &Response) -> CtiResult<()> {
        let status = response.status();
        if status.is_ok() {
            match &request.method {
                Method::GetVersion => {
                    debug!(
                        version = response.data.as_deref().unwrap_or(""),
                        "server version"
                    );
                }
                Method::GetClients => {
                    debug!(
                        clients = response.data.as_deref().unwrap_or(""),
                        "connected clients"
                    );
                }
                _ => {}
            }
        }
        status
    }

    fn encode_wire(&self, xml: String) -> Vec<u8> {
        if self.wire_base64 {
            STANDARD.encode(xml).into_bytes()
        } else {
            xml.into_bytes()
        }
    }

    fn decode_wire(&self, payload: Vec<u8>) -> String {
        if !self.wire_base64 {
            return String::from_utf8_lossy(&payload).into_owned();
        }
        match STANDARD.decode(&payload) {
            Ok(decoded) => String::from_utf8_lossy(&decoded).into_owned(),
            Err(error) => {
                warn!(%error, "payload is not valid base64, passing it through");
                String::from_utf8_lossy(&payload).into_owned()
            }
        }
    }
}

/// Builds the identity for one connection attempt.
///
/// The GUID is salted with the current time, so every attempt presents a
/// distinct client instance to the server.
pub fn fresh_identity(config: &ListenerConfig) -> ClientIdentity {
    let salt = chrono::Utc::now().timestamp_micros().to_string();
    ClientIdentity {
        client_id: config.client_id.clone(),
        client_type: config.client_type.clone(),
        client_guid: client_guid(&config.unique_key, &salt),
    }
}

/// One connection attempt against the configured server.
pub fn dial(config: &ListenerConfig) -> ListenerResult<(ClientIdentity, Connection<Transport>)> {
    let identity = fresh_identity(config);
    let mut connector = Connector::new(&config.url())?
        .header("ClientGUID", identity.client_guid.clone())
        .header("ClientID", identity.client_id.clone())
        .header("ClientType", identity.client_type.clone())
        .header("Test-Agent", AGENT)
        .header("User-Agent", AGENT_DEV)
        .read_timeout(config.read_timeout());
    if let Some(proxy) = config.proxy_addr() {
        connector = connector.proxy(proxy);
    }
    let connection = connector.connect()?;
    Ok((identity, connection))
}
