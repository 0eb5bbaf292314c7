//! Typed CTI envelopes and their XML wire forms.
//!
//! The protocol exchanges three message shapes over one socket. A
//! `<Request>` carries the protocol version, a correlation id, the client
//! identity, a method name and a `<Data>` block of per-method children. A
//! `<Response>` answers one request by id with a status code. An `<Event>`
//! is pushed by the server unasked, with every field as an attribute on
//! the root element.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use callbridge_core::{Command, EventRecord};

use crate::PROTOCOL_VERSION;
use crate::error::{CtiError, CtiResult};

/// Every event type ORed together; the default subscription.
pub const EVENT_MASK_ALL: u8 = 7;

/// Switch event types; the discriminants double as subscription mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    /// The switch asks where to route an incoming call.
    TransferRequest = 1,
    /// A call has been answered.
    CallStart = 2,
    /// A call has finished.
    CallEnd = 4,
}

impl EventKind {
    /// Subscription mask bit.
    pub fn bit(&self) -> u8 {
        *self as u8
    }

    /// Maps the wire `type` attribute; unknown codes are `None`.
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::TransferRequest),
            "2" => Some(Self::CallStart),
            "4" => Some(Self::CallEnd),
            _ => None,
        }
    }

    /// Kind of an outbox record.
    pub fn of(record: &EventRecord) -> Self {
        match record {
            EventRecord::TransferRequest { .. } => Self::TransferRequest,
            EventRecord::CallStart { .. } => Self::CallStart,
            EventRecord::CallEnd { .. } => Self::CallEnd,
        }
    }

    /// True when `mask` subscribes to this kind.
    pub fn matches_mask(&self, mask: u8) -> bool {
        mask & self.bit() != 0
    }
}

/// Call direction indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// Wire code: incoming 0, outgoing 1.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Incoming => "0",
            Self::Outgoing => "1",
        }
    }
}

/// The credentials every request envelope carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_type: String,
    pub client_guid: String,
}

/// The event a `Generate` request asks the server to simulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateEvent {
    TransferRequest {
        from: String,
    },
    CallStart {
        from: String,
        to: String,
    },
    CallEnd {
        from: String,
        to: String,
        start: i64,
        end: i64,
        duration: i64,
        record: String,
        direction: Direction,
        /// GUID of the receiving client, or `*` for all clients.
        client_guid: String,
    },
}

impl GenerateEvent {
    fn kind(&self) -> EventKind {
        match self {
            Self::TransferRequest { .. } => EventKind::TransferRequest,
            Self::CallStart { .. } => EventKind::CallStart,
            Self::CallEnd { .. } => EventKind::CallEnd,
        }
    }

    fn data_children(&self) -> Vec<(&'static str, String)> {
        let mut children = vec![("Event", self.kind().bit().to_string())];
        match self {
            Self::TransferRequest { from } => {
                children.push(("From", from.clone()));
            }
            Self::CallStart { from, to } => {
                children.push(("From", from.clone()));
                children.push(("To", to.clone()));
            }
            Self::CallEnd {
                from,
                to,
                start,
                end,
                duration,
                record,
                direction,
                client_guid,
            } => {
                children.push(("From", from.clone()));
                children.push(("To", to.clone()));
                children.push(("Start", start.to_string()));
                children.push(("End", end.to_string()));
                children.push(("Duration", duration.to_string()));
                children.push(("Record", record.clone()));
                children.push(("Direction", direction.code().to_string()));
                children.push(("ClientGUID", client_guid.clone()));
            }
        }
        children
    }
}

/// A CTI method with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// Originate a call between two numbers.
    Call { from: String, to: String },
    /// Redirect a live call to another number.
    Transfer { call_id: String, to: String },
    /// Subscribe to server events matching the mask.
    GetEvents { event_mask: u8 },
    /// Ask for the server version.
    GetVersion,
    /// Switch server-side call simulation on or off.
    Simulation { enabled: bool },
    /// List clients known to the server.
    GetClients,
    /// Ask the server to emit a synthetic event.
    Generate(GenerateEvent),
}

impl Method {
    /// Wire name carried in the `Method` element.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Call { .. } => "Call",
            Self::Transfer { .. } => "Transfer",
            Self::GetEvents { .. } => "GetEvents",
            Self::GetVersion => "GetVersion",
            Self::Simulation { .. } => "Simulation",
            Self::GetClients => "GetClients",
            Self::Generate(_) => "Generate",
        }
    }

    fn data_children(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Call { from, to } => {
                vec![("From", from.clone()), ("To", to.clone())]
            }
            Self::Transfer { call_id, to } => {
                vec![("CallID", call_id.clone()), ("To", to.clone())]
            }
            Self::GetEvents { event_mask } => {
                vec![("EventMask", event_mask.to_string())]
            }
            Self::GetVersion | Self::GetClients => Vec::new(),
            Self::Simulation { enabled } => {
                vec![("Mode", if *enabled { "on" } else { "off" }.to_string())]
            }
            Self::Generate(event) => event.data_children(),
        }
    }
}

impl From<Command> for Method {
    fn from(command: Command) -> Self {
        match command {
            Command::Call { from, to } => Self::Call { from, to },
            Command::Transfer { call_id, to } => Self::Transfer { call_id, to },
        }
    }
}

/// One outbound request envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: i64,
    pub identity: ClientIdentity,
    pub method: Method,
}

impl Request {
    pub fn new(id: i64, identity: ClientIdentity, method: Method) -> Self {
        Self {
            id,
            identity,
            method,
        }
    }

    /// Serializes the envelope, without an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer
            .write_event(Event::Start(BytesStart::new("Request")))
            .unwrap();
        write_text_element(&mut writer, "ProtocolVersion", PROTOCOL_VERSION);
        write_text_element(&mut writer, "RequestID", &self.id.to_string());
        write_text_element(&mut writer, "ClientID", &self.identity.client_id);
        write_text_element(&mut writer, "ClientType", &self.identity.client_type);
        write_text_element(&mut writer, "ClientGUID", &self.identity.client_guid);
        write_text_element(&mut writer, "Method", self.method.name());

        let children = self.method.data_children();
        if children.is_empty() {
            writer
                .write_event(Event::Empty(BytesStart::new("Data")))
                .unwrap();
        } else {
            writer
                .write_event(Event::Start(BytesStart::new("Data")))
                .unwrap();
            for (name, value) in &children {
                write_text_element(&mut writer, name, value);
            }
            writer
                .write_event(Event::End(BytesEnd::new("Data")))
                .unwrap();
        }

        writer
            .write_event(Event::End(BytesEnd::new("Request")))
            .unwrap();

        let bytes = writer.into_inner().into_inner();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// One inbound response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: i64,
    pub code: u8,
    pub details: String,
    /// Raw text of the `Data` block, when the server sent one.
    pub data: Option<String>,
}

impl Response {
    /// Request processed successfully.
    pub const CODE_OK: u8 = 0;
    /// Request refused because the client failed authentication.
    pub const CODE_AUTHENTICATION: u8 = 1;
    /// Request refused for any other reason.
    pub const CODE_OTHER: u8 = 2;

    /// Interprets the status code carried by the response.
    pub fn status(&self) -> CtiResult<()> {
        match self.code {
            Self::CODE_OK => Ok(()),
            Self::CODE_AUTHENTICATION => Err(CtiError::AuthenticationRejected {
                details: self.details.clone(),
            }),
            code => Err(CtiError::ApplicationRejected {
                code,
                details: self.details.clone(),
            }),
        }
    }
}

/// Any inbound message the client understands, classified by root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtiMessage {
    Response(Response),
    Event(EventRecord),
}

/// Parses one inbound message.
///
/// Returns `Ok(None)` for well-formed XML the client deliberately ignores:
/// an unknown root element, or an event of an unknown type.
pub fn parse_message(xml: &str) -> CtiResult<Option<CtiMessage>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return match e.name().as_ref() {
                    b"Event" => parse_event(&e),
                    b"Response" => {
                        parse_response_fields(&mut reader).map(|r| Some(CtiMessage::Response(r)))
                    }
                    _ => Ok(None),
                };
            }
            Ok(Event::Eof) => return Err(CtiError::xml("document has no root element")),
            Ok(_) => {}
            Err(e) => return Err(CtiError::xml(e.to_string())),
        }
        buf.clear();
    }
}

/// Decodes an `<Event>` root into an outbox record.
///
/// Every field rides as an attribute; values are kept as wire text.
fn parse_event(root: &BytesStart) -> CtiResult<Option<CtiMessage>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in root.attributes() {
        let attr = attr.map_err(|e| CtiError::xml(format!("bad event attribute: {e}")))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| CtiError::xml(format!("bad event attribute value: {e}")))?
            .into_owned();
        attrs.push((name, value));
    }

    let get = |name: &str| -> CtiResult<String> {
        attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| CtiError::xml(format!("event missing attribute {name:?}")))
    };

    let type_code = get("type")?;
    let Some(kind) = EventKind::from_type_code(&type_code) else {
        return Ok(None);
    };
    let record = match kind {
        EventKind::TransferRequest => EventRecord::TransferRequest {
            call_id: get("callID")?,
            from: get("from")?,
        },
        EventKind::CallStart => EventRecord::CallStart {
            call_id: get("callID")?,
            from: get("from")?,
            to: get("to")?,
        },
        EventKind::CallEnd => EventRecord::CallEnd {
            call_id: get("callID")?,
            from: get("from")?,
            to: get("to")?,
            start: get("start")?,
            end: get("end")?,
            duration: get("duration")?,
            direction: get("direction")?,
            record: get("record")?,
        },
    };
    Ok(Some(CtiMessage::Event(record)))
}

/// Reads the children of an already-opened `<Response>` element.
fn parse_response_fields(reader: &mut Reader<&[u8]>) -> CtiResult<Response> {
    let mut request_id: Option<String> = None;
    let mut code: Option<String> = None;
    let mut details: Option<String> = None;
    let mut data: Option<String> = None;
    let mut in_data = false;
    let mut current: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if in_data {
                    // Markup nested under Data; only its text is kept.
                } else if name == "Data" {
                    in_data = true;
                    data.get_or_insert_with(String::new);
                } else {
                    current = Some(name);
                }
            }
            Ok(Event::Empty(e)) => {
                if !in_data && e.name().as_ref() == b"Data" {
                    data.get_or_insert_with(String::new);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "Response" {
                    break;
                }
                if name == "Data" {
                    in_data = false;
                } else if !in_data {
                    current = None;
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| CtiError::xml(format!("bad response text: {e}")))?
                    .into_owned();
                collect_field(
                    &text,
                    in_data,
                    current.as_deref(),
                    &mut request_id,
                    &mut code,
                    &mut details,
                    &mut data,
                );
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                collect_field(
                    &text,
                    in_data,
                    current.as_deref(),
                    &mut request_id,
                    &mut code,
                    &mut details,
                    &mut data,
                );
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(CtiError::xml(e.to_string())),
        }
        buf.clear();
    }

    let request_id = request_id
        .ok_or_else(|| CtiError::xml("response missing RequestID"))?
        .parse::<i64>()
        .map_err(|_| CtiError::xml("response RequestID is not a number"))?;
    let code = code
        .ok_or_else(|| CtiError::xml("response missing Code"))?
        .parse::<u8>()
        .map_err(|_| CtiError::xml("response Code is not a number"))?;

    Ok(Response {
        request_id,
        code,
        details: details.unwrap_or_default(),
        data,
    })
}

#[allow(clippy::too_many_arguments)]
fn collect_field(
    text: &str,
    in_data: bool,
    current: Option<&str>,
    request_id: &mut Option<String>,
    code: &mut Option<String>,
    details: &mut Option<String>,
    data: &mut Option<String>,
) {
    if in_data {
        data.get_or_insert_with(String::new).push_str(text);
        return;
    }
    match current {
        Some("RequestID") => *request_id = Some(text.to_string()),
        Some("Code") => *code = Some(text.to_string()),
        Some("Details") => *details = Some(text.to_string()),
        _ => {}
    }
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .unwrap();
    writer.write_event(Event::Text(BytesText::new(value))).unwrap();
    writer.write_event(Event::End(BytesEnd::new(name))).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ClientIdentity {
        ClientIdentity {
            client_id: "171".to_string(),
            client_type: "callbridge".to_string(),
            client_guid: "d41d8cd9-8f00-b204-e980-0998ecf8427e".to_string(),
        }
    }

    mod request_xml {
        use super::*;

        #[test]
        fn call() {
            let request = Request::new(
                1756000101,
                identity(),
                Method::Call {
                    from: "555".to_string(),
                    to: "222".to_string(),
                },
            );
            insta::assert_snapshot!(
                request.to_xml(),
                @"<Request><ProtocolVersion>1</ProtocolVersion><RequestID>1756000101</RequestID><ClientID>171</ClientID><ClientType>callbridge</ClientType><ClientGUID>d41d8cd9-8f00-b204-e980-0998ecf8427e</ClientGUID><Method>Call</Method><Data><From>555</From><To>222</To></Data></Request>"
            );
        }

        #[test]
        fn transfer() {
            let request = Request::new(
                7,
                identity(),
                Method::Transfer {
                    call_id: "34".to_string(),
                    to: "101".to_string(),
                },
            );
            let xml = request.to_xml();
            assert!(xml.contains("<Method>Transfer</Method>"));
            assert!(xml.contains("<Data><CallID>34</CallID><To>101</To></Data>"));
        }

        #[test]
        fn get_events_carries_the_mask() {
            let request = Request::new(7, identity(), Method::GetEvents { event_mask: 7 });
            assert!(request
                .to_xml()
                .contains("<Method>GetEvents</Method><Data><EventMask>7</EventMask></Data>"));
        }

        #[test]
        fn parameterless_methods_have_an_empty_data_block() {
            let version = Request::new(7, identity(), Method::GetVersion);
            assert!(version.to_xml().contains("<Method>GetVersion</Method><Data/>"));

            let clients = Request::new(7, identity(), Method::GetClients);
            assert!(clients.to_xml().contains("<Method>GetClients</Method><Data/>"));
        }

        #[test]
        fn simulation_mode_is_on_or_off() {
            let on = Request::new(7, identity(), Method::Simulation { enabled: true });
            assert!(on.to_xml().contains("<Data><Mode>on</Mode></Data>"));

            let off = Request::new(7, identity(), Method::Simulation { enabled: false });
            assert!(off.to_xml().contains("<Data><Mode>off</Mode></Data>"));
        }

        #[test]
        fn generate_call_end_lists_the_journal_fields() {
            let request = Request::new(
                7,
                identity(),
                Method::Generate(GenerateEvent::CallEnd {
                    from: "101".to_string(),
                    to: "202".to_string(),
                    start: 1700000000,
                    end: 1700000042,
                    duration: 42,
                    record: "http://pbx/records/34.mp3".to_string(),
                    direction: Direction::Incoming,
                    client_guid: "*".to_string(),
                }),
            );
            insta::assert_snapshot!(
                request.to_xml(),
                @"<Request><ProtocolVersion>1</ProtocolVersion><RequestID>7</RequestID><ClientID>171</ClientID><ClientType>callbridge</ClientType><ClientGUID>d41d8cd9-8f00-b204-e980-0998ecf8427e</ClientGUID><Method>Generate</Method><Data><Event>4</Event><From>101</From><To>202</To><Start>1700000000</Start><End>1700000042</End><Duration>42</Duration><Record>http://pbx/records/34.mp3</Record><Direction>0</Direction><ClientGUID>*</ClientGUID></Data></Request>"
            );
        }

        #[test]
        fn generate_transfer_request_carries_only_from() {
            let request = Request::new(
                7,
                identity(),
                Method::Generate(GenerateEvent::TransferRequest {
                    from: "555".to_string(),
                }),
            );
            assert!(request
                .to_xml()
                .contains("<Data><Event>1</Event><From>555</From></Data>"));
        }

        #[test]
        fn payload_text_is_escaped() {
            let request = Request::new(
                7,
                identity(),
                Method::Call {
                    from: "<55>".to_string(),
                    to: "2&2".to_string(),
                },
            );
            let xml = request.to_xml();
            assert!(xml.contains("<From>&lt;55&gt;</From>"));
            assert!(xml.contains("<To>2&amp;2</To>"));
        }

        #[test]
        fn queued_commands_map_onto_methods() {
            let call = Command::Call {
                from: "555".to_string(),
                to: "222".to_string(),
            };
            assert_eq!(
                Method::from(call),
                Method::Call {
                    from: "555".to_string(),
                    to: "222".to_string(),
                }
            );

            let transfer = Command::Transfer {
                call_id: "34".to_string(),
                to: "101".to_string(),
            };
            assert_eq!(
                Method::from(transfer),
                Method::Transfer {
                    call_id: "34".to_string(),
                    to: "101".to_string(),
                }
            );
        }
    }

    mod response_parse {
        use super::*;

        fn parse_response(xml: &str) -> Response {
            match parse_message(xml).unwrap() {
                Some(CtiMessage::Response(response)) => response,
                other => panic!("expected a response, got {other:?}"),
            }
        }

        #[test]
        fn success_response() {
            let response = parse_response(
                "<Response><RequestID>1756000101</RequestID><Code>0</Code>\
                 <Details></Details><Data/></Response>",
            );
            assert_eq!(response.request_id, 1756000101);
            assert_eq!(response.code, 0);
            assert_eq!(response.details, "");
            assert_eq!(response.data.as_deref(), Some(""));
            assert!(response.status().is_ok());
        }

        #[test]
        fn authentication_rejection_is_fatal() {
            let response = parse_response(
                "<Response><RequestID>5</RequestID><Code>1</Code>\
                 <Details>unknown client</Details></Response>",
            );
            let error = response.status().unwrap_err();
            assert!(matches!(error, CtiError::AuthenticationRejected { .. }));
            assert!(error.is_fatal());
        }

        #[test]
        fn other_codes_are_application_rejections() {
            let response = parse_response(
                "<Response><RequestID>5</RequestID><Code>2</Code>\
                 <Details>busy</Details></Response>",
            );
            match response.status().unwrap_err() {
                CtiError::ApplicationRejected { code, details } => {
                    assert_eq!(code, 2);
                    assert_eq!(details, "busy");
                }
                other => panic!("unexpected error {other:?}"),
            }

            let unlisted = parse_response(
                "<Response><RequestID>5</RequestID><Code>9</Code><Details/></Response>",
            );
            assert!(!unlisted.status().unwrap_err().is_fatal());
        }

        #[test]
        fn data_text_is_captured() {
            let response = parse_response(
                "<Response><RequestID>5</RequestID><Code>0</Code>\
                 <Details/><Data>1.6.0</Data></Response>",
            );
            assert_eq!(response.data.as_deref(), Some("1.6.0"));
        }

        #[test]
        fn nested_data_markup_keeps_its_text() {
            let response = parse_response(
                "<Response><RequestID>5</RequestID><Code>0</Code>\
                 <Data><Client>171</Client><Client>180</Client></Data></Response>",
            );
            assert_eq!(response.data.as_deref(), Some("171180"));
        }

        #[test]
        fn missing_request_id_is_an_error() {
            let result = parse_message("<Response><Code>0</Code></Response>");
            assert!(matches!(result, Err(CtiError::Xml { .. })));
        }

        #[test]
        fn non_numeric_code_is_an_error() {
            let result = parse_message(
                "<Response><RequestID>5</RequestID><Code>ok</Code></Response>",
            );
            assert!(matches!(result, Err(CtiError::Xml { .. })));
        }
    }

    mod event_parse {
        use super::*;

        fn parse_event(xml: &str) -> EventRecord {
            match parse_message(xml).unwrap() {
                Some(CtiMessage::Event(record)) => record,
                other => panic!("expected an event, got {other:?}"),
            }
        }

        #[test]
        fn call_start_from_attributes() {
            let record =
                parse_event(r#"<Event type="2" callID="34" from="101" to="202"/>"#);
            assert_eq!(
                record,
                EventRecord::CallStart {
                    call_id: "34".to_string(),
                    from: "101".to_string(),
                    to: "202".to_string(),
                }
            );
        }

        #[test]
        fn transfer_request_from_attributes() {
            let record = parse_event(r#"<Event type="1" callID="77" from="555"/>"#);
            assert_eq!(
                record,
                EventRecord::TransferRequest {
                    call_id: "77".to_string(),
                    from: "555".to_string(),
                }
            );
        }

        #[test]
        fn call_end_keeps_values_as_wire_text() {
            let record = parse_event(
                r#"<Event type="4" callID="34" from="101" to="202" start="1700000000" end="1700000042" duration="42" direction="0" record="http://pbx/records/34.mp3"/>"#,
            );
            assert_eq!(
                record,
                EventRecord::CallEnd {
                    call_id: "34".to_string(),
                    from: "101".to_string(),
                    to: "202".to_string(),
                    start: "1700000000".to_string(),
                    end: "1700000042".to_string(),
                    duration: "42".to_string(),
                    direction: "0".to_string(),
                    record: "http://pbx/records/34.mp3".to_string(),
                }
            );
        }

        #[test]
        fn unknown_event_type_is_ignored() {
            let parsed = parse_message(r#"<Event type="9" callID="1"/>"#).unwrap();
            assert!(parsed.is_none());
        }

        #[test]
        fn missing_attribute_is_an_error() {
            let result = parse_message(r#"<Event type="2" callID="34" from="101"/>"#);
            assert!(matches!(result, Err(CtiError::Xml { .. })));
        }
    }

    mod message_classification {
        use super::*;

        #[test]
        fn unknown_root_is_ignored() {
            assert!(parse_message("<Notice>hello</Notice>").unwrap().is_none());
        }

        #[test]
        fn garbage_is_an_error() {
            assert!(matches!(
                parse_message("<Response><RequestID>"),
                Err(CtiError::Xml { .. })
            ));
            assert!(matches!(parse_message(""), Err(CtiError::Xml { .. })));
        }
    }

    mod masks {
        use super::*;

        #[test]
        fn mask_six_excludes_transfer_requests() {
            let mask = EventKind::CallStart.bit() | EventKind::CallEnd.bit();
            assert_eq!(mask, 6);
            assert!(!EventKind::TransferRequest.matches_mask(mask));
            assert!(EventKind::CallStart.matches_mask(mask));
            assert!(EventKind::CallEnd.matches_mask(mask));
        }

        #[test]
        fn full_mask_matches_everything() {
            for kind in [
                EventKind::TransferRequest,
                EventKind::CallStart,
                EventKind::CallEnd,
            ] {
                assert!(kind.matches_mask(EVENT_MASK_ALL));
            }
        }

        #[test]
        fn kind_of_record() {
            let record = EventRecord::TransferRequest {
                call_id: "1".to_string(),
                from: "2".to_string(),
            };
            assert_eq!(EventKind::of(&record), EventKind::TransferRequest);
        }
    }
}
