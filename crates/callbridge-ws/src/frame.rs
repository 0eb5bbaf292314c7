//! WebSocket frame codec (RFC 6455 section 5.2).
//!
//! Frames are decoded incrementally: the [`FrameDecoder`] accepts bytes in
//! whatever chunks the socket produces, surfaces a [`Frame`] once the header
//! and payload are complete, and holds surplus bytes for the frame behind
//! it. Encoding mirrors decoding; masked payloads XOR byte `i` with
//! `key[i % 4]`.

use crate::error::{WsError, WsResult};

/// Fragment size outgoing messages are chunked at.
pub const OPTIMAL_FRAGMENT_LEN: usize = 32767;

/// Largest encodable payload length; the top bit of the 64-bit length
/// field must stay clear.
const MAX_PAYLOAD_LEN: u64 = i64::MAX as u64;

/// Frame type, bits 5-8 of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// True for close, ping and pong frames.
    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = WsError;

    fn try_from(value: u8) -> WsResult<Self> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(WsError::malformed(format!("invalid opcode {other:#x}"))),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        match value {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }
}

/// XORs `data` in place with the masking key, RFC wire byte order.
///
/// Applying the same key twice restores the input.
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// One complete WebSocket frame with an unmasked payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    fin: bool,
    opcode: OpCode,
    masking_key: Option<[u8; 4]>,
    payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame, validating the payload length is encodable.
    pub fn new(opcode: OpCode, payload: Vec<u8>, fin: bool) -> WsResult<Self> {
        check_len(payload.len() as u64)?;
        Ok(Self {
            fin,
            opcode,
            masking_key: None,
            payload,
        })
    }

    /// Final text frame.
    pub fn text(payload: impl Into<Vec<u8>>) -> WsResult<Self> {
        Self::new(OpCode::Text, payload.into(), true)
    }

    /// Final ping frame.
    pub fn ping(payload: impl Into<Vec<u8>>) -> WsResult<Self> {
        Self::new(OpCode::Ping, payload.into(), true)
    }

    /// Final pong frame.
    pub fn pong(payload: impl Into<Vec<u8>>) -> WsResult<Self> {
        Self::new(OpCode::Pong, payload.into(), true)
    }

    /// Final close frame.
    pub fn close(payload: impl Into<Vec<u8>>) -> WsResult<Self> {
        Self::new(OpCode::Close, payload.into(), true)
    }

    /// Masks the frame with the given key.
    pub fn with_masking_key(mut self, key: [u8; 4]) -> Self {
        self.masking_key = Some(key);
        self
    }

    /// Masks the frame with a random key.
    pub fn masked(self) -> Self {
        let mut rng = rand::rng();
        self.with_masking_key(rand::Rng::random(&mut rng))
    }

    pub fn fin(&self) -> bool {
        self.fin
    }

    /// Flips the final flag; the fragmenter clears it when a frame stops
    /// being the last of its message.
    pub fn set_fin(&mut self, fin: bool) {
        self.fin = fin;
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn is_masked(&self) -> bool {
        self.masking_key.is_some()
    }

    pub fn masking_key(&self) -> Option<[u8; 4]> {
        self.masking_key
    }

    /// Unmasked payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the frame, returning its unmasked payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Appends payload bytes, re-validating the total length.
    pub fn append(&mut self, data: &[u8]) -> WsResult<()> {
        let total = (self.payload.len() as u64)
            .checked_add(data.len() as u64)
            .ok_or_else(|| WsError::malformed("payload length overflow"))?;
        check_len(total)?;
        self.payload.extend_from_slice(data);
        Ok(())
    }

    /// Serializes the frame, masking the payload if a key is set.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 14);

        let mut byte = u8::from(self.opcode);
        if self.fin {
            byte |= 0x80;
        }
        out.push(byte);

        let mask_bit = if self.masking_key.is_some() { 0x80 } else { 0x00 };
        let len = self.payload.len() as u64;
        if len <= 125 {
            out.push(mask_bit | len as u8);
        } else if len <= u16::MAX as u64 {
            out.push(mask_bit | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(mask_bit | 127);
            out.extend_from_slice(&len.to_be_bytes());
        }

        match self.masking_key {
            Some(key) => {
                out.extend_from_slice(&key);
                let start = out.len();
                out.extend_from_slice(&self.payload);
                apply_mask(&mut out[start..], key);
            }
            None => out.extend_from_slice(&self.payload),
        }
        out
    }
}

fn check_len(len: u64) -> WsResult<()> {
    if len > MAX_PAYLOAD_LEN {
        return Err(WsError::malformed(format!(
            "payload length {len} exceeds maximum"
        )));
    }
    Ok(())
}

/// Incremental frame parser.
///
/// Feed it socket bytes as they arrive; [`FrameDecoder::try_next`] yields a
/// frame once one is complete and keeps the surplus buffered for the next
/// one. A truncated frame is never an error, only a reason to feed more.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw socket bytes to the parse buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed by a completed frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drops any buffered bytes; used when a connection is torn down.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Parses the next complete frame off the front of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Header violations
    /// (reserved bits, unknown opcode, oversized declared length) are
    /// fatal.
    pub fn try_next(&mut self) -> WsResult<Option<Frame>> {
        let buf = &self.buf;
        if buf.len() < 2 {
            return Ok(None);
        }

        let b0 = buf[0];
        if b0 & 0x70 != 0 {
            return Err(WsError::malformed("reserved bit set"));
        }
        let fin = b0 & 0x80 != 0;
        let opcode = OpCode::try_from(b0 & 0x0F)?;

        let b1 = buf[1];
        let masked = b1 & 0x80 != 0;
        let mut offset = 2usize;
        let declared: u64 = match b1 & 0x7F {
            126 => {
                if buf.len() < offset + 2 {
                    return Ok(None);
                }
                let len = u16::from_be_bytes([buf[2], buf[3]]) as u64;
                offset += 2;
                len
            }
            127 => {
                if buf.len() < offset + 8 {
                    return Ok(None);
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&buf[2..10]);
                offset += 8;
                u64::from_be_bytes(bytes)
            }
            short => short as u64,
        };
        check_len(declared)?;
        let payload_len = usize::try_from(declared)
            .map_err(|_| WsError::malformed("declared payload length exceeds platform"))?;

        let masking_key = if masked {
            if buf.len() < offset + 4 {
                return Ok(None);
            }
            let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
            offset += 4;
            Some(key)
        } else {
            None
        };

        let total = offset
            .checked_add(payload_len)
            .ok_or_else(|| WsError::malformed("payload length overflow"))?;
        if buf.len() < total {
            return Ok(None);
        }

        let mut payload = buf[offset..total].to_vec();
        if let Some(key) = masking_key {
            apply_mask(&mut payload, key);
        }
        self.buf.drain(..total);

        Ok(Some(Frame {
            fin,
            opcode,
            masking_key,
            payload,
        }))
    }
}
