//! CTI protocol layer: typed request/response/event envelopes, their XML
//! wire forms, correlation ids, and the derived client GUID.

pub mod envelope;
pub mod error;
pub mod ids;

/// The only protocol revision this client speaks.
pub const PROTOCOL_VERSION: &str = "1";

pub use envelope::{
    ClientIdentity, CtiMessage, Direction, EVENT_MASK_ALL, EventKind, GenerateEvent, Method,
    Request, Response, parse_message,
};
pub use error::{CtiError, CtiResult};
pub use ids::{RequestIdGenerator, client_guid};
