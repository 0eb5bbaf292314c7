//! Message assembly and fragmentation.
//!
//! A message is an ordered chain of frames: every frame but the last is
//! non-final, the first frame fixes the payload kind, later frames must be
//! continuations, and control messages are exactly one frame. Outgoing
//! messages are chunked at [`OPTIMAL_FRAGMENT_LEN`] bytes.

use crate::error::{WsError, WsResult};
use crate::frame::{Frame, OPTIMAL_FRAGMENT_LEN, OpCode};

/// What a message is, fixed by its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Binary,
    Ping,
    Pong,
    Close,
}

impl MessageKind {
    fn from_opcode(opcode: OpCode) -> Option<Self> {
        match opcode {
            OpCode::Text => Some(Self::Text),
            OpCode::Binary => Some(Self::Binary),
            OpCode::Ping => Some(Self::Ping),
            OpCode::Pong => Some(Self::Pong),
            OpCode::Close => Some(Self::Close),
            OpCode::Continuation => None,
        }
    }

    /// True for ping, pong and close messages.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong | Self::Close)
    }
}

/// Assembles one incoming message from decoded frames.
#[derive(Debug, Default)]
pub struct IncomingMessage {
    frames: Vec<Frame>,
}

impl IncomingMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the next decoded frame, enforcing the chain grammar.
    pub fn push_frame(&mut self, frame: Frame) -> WsResult<()> {
        if self.is_ready() {
            return Err(WsError::sequence("message is already complete"));
        }
        match frame.opcode() {
            OpCode::Continuation => {
                if self.frames.is_empty() {
                    return Err(WsError::sequence("first frame cannot be a continuation"));
                }
            }
            OpCode::Ping | OpCode::Pong | OpCode::Close => {
                if !self.frames.is_empty() {
                    return Err(WsError::sequence(
                        "control frame inside a fragmented message",
                    ));
                }
            }
            OpCode::Text | OpCode::Binary => {
                if !self.frames.is_empty() {
                    return Err(WsError::sequence("expected a continuation frame"));
                }
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    /// True once the final frame has landed.
    pub fn is_ready(&self) -> bool {
        self.frames.last().is_some_and(Frame::fin)
    }

    /// Message kind, `None` until the first frame arrives.
    pub fn kind(&self) -> Option<MessageKind> {
        self.frames
            .first()
            .and_then(|frame| MessageKind::from_opcode(frame.opcode()))
    }

    /// Consumes a ready message into its kind and concatenated payload.
    pub fn into_parts(self) -> WsResult<(MessageKind, Vec<u8>)> {
        if !self.is_ready() {
            return Err(WsError::sequence("message is not complete yet"));
        }
        let kind = self
            .kind()
            .ok_or_else(|| WsError::sequence("message has no leading data frame"))?;
        let mut payload = Vec::with_capacity(self.frames.iter().map(Frame::len).sum());
        for frame in self.frames {
            payload.extend_from_slice(frame.payload());
        }
        Ok((kind, payload))
    }
}

/// A fragmented outgoing data message.
///
/// Control traffic goes out as bare frames; only text and binary payloads
/// are fragmented into messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    frames: Vec<Frame>,
}

impl OutgoingMessage {
    /// Builds a text message chunked at the optimal fragment size.
    pub fn text(data: impl Into<Vec<u8>>) -> WsResult<Self> {
        Self::data(OpCode::Text, data.into())
    }

    /// Builds a binary message chunked at the optimal fragment size.
    pub fn binary(data: impl Into<Vec<u8>>) -> WsResult<Self> {
        Self::data(OpCode::Binary, data.into())
    }

    fn data(opcode: OpCode, data: Vec<u8>) -> WsResult<Self> {
        let mut frames = Vec::new();
        if data.is_empty() {
            frames.push(Frame::new(opcode, Vec::new(), true)?);
            return Ok(Self { frames });
        }
        let chunks: Vec<&[u8]> = data.chunks(OPTIMAL_FRAGMENT_LEN).collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let op = if i == 0 { opcode } else { OpCode::Continuation };
            frames.push(Frame::new(op, chunk.to_vec(), i == last)?);
        }
        Ok(Self { frames })
    }

    /// Appends payload to the message.
    ///
    /// Tops the last frame up to the fragment bound first, then opens one
    /// continuation frame for the rest and moves the final flag onto it.
    pub fn add_data(&mut self, data: &[u8]) -> WsResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        // Construction guarantees at least one frame.
        let last_index = self.frames.len() - 1;
        let mut rest = data;
        {
            let last = &mut self.frames[last_index];
            let room = OPTIMAL_FRAGMENT_LEN.saturating_sub(last.len());
            if room > 0 {
                let take = room.min(rest.len());
                last.append(&rest[..take])?;
                rest = &rest[take..];
            }
        }
        if rest.is_empty() {
            return Ok(());
        }
        let fin = self.frames[last_index].fin();
        self.frames
            .push(Frame::new(OpCode::Continuation, rest.to_vec(), fin)?);
        self.frames[last_index].set_fin(false);
        Ok(())
    }

    /// The frame chain, in send order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Total payload length across all frames.
    pub fn payload_len(&self) -> usize {
        self.frames.iter().map(Frame::len).sum()
    }

    /// Serializes all frames back to back.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in &self.frames {
            out.extend_from_slice(&frame.encode());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDecoder;

    mod incoming {
        use super::*;

        #[test]
        fn single_final_text_frame_completes() {
            let mut message = IncomingMessage::new();
            message.push_frame(Frame::text("hello").unwrap()).unwrap();

            assert!(message.is_ready());
            let (kind, payload) = message.into_parts().unwrap();
            assert_eq!(kind, MessageKind::Text);
            assert_eq!(payload, b"hello");
        }

        #[test]
        fn fragments_concatenate_in_order() {
            let mut message = IncomingMessage::new();
            message
                .push_frame(Frame::new(OpCode::Text, b"one ".to_vec(), false).unwrap())
                .unwrap();
            assert!(!message.is_ready());
            message
                .push_frame(Frame::new(OpCode::Continuation, b"two ".to_vec(), false).unwrap())
                .unwrap();
            message
                .push_frame(Frame::new(OpCode::Continuation, b"three".to_vec(), true).unwrap())
                .unwrap();

            assert!(message.is_ready());
            let (kind, payload) = message.into_parts().unwrap();
            assert_eq!(kind, MessageKind::Text);
            assert_eq!(payload, b"one two three");
        }

        #[test]
        fn rejects_leading_continuation() {
            let mut message = IncomingMessage::new();
            let frame = Frame::new(OpCode::Continuation, b"x".to_vec(), true).unwrap();
            assert!(matches!(
                message.push_frame(frame),
                Err(WsError::InvalidSequence { .. })
            ));
        }

        #[test]
        fn rejects_second_data_frame() {
            let mut message = IncomingMessage::new();
            message
                .push_frame(Frame::new(OpCode::Text, b"a".to_vec(), false).unwrap())
                .unwrap();
            let frame = Frame::new(OpCode::Text, b"b".to_vec(), true).unwrap();
            assert!(matches!(
                message.push_frame(frame),
                Err(WsError::InvalidSequence { .. })
            ));
        }

        #[test]
        fn rejects_control_frame_mid_message() {
            let mut message = IncomingMessage::new();
            message
                .push_frame(Frame::new(OpCode::Text, b"a".to_vec(), false).unwrap())
                .unwrap();
            assert!(matches!(
                message.push_frame(Frame::ping("").unwrap()),
                Err(WsError::InvalidSequence { .. })
            ));
        }

        #[test]
        fn rejects_frame_after_completion() {
            let mut message = IncomingMessage::new();
            message.push_frame(Frame::text("done").unwrap()).unwrap();
            let frame = Frame::new(OpCode::Continuation, b"x".to_vec(), true).unwrap();
            assert!(matches!(
                message.push_frame(frame),
                Err(WsError::InvalidSequence { .. })
            ));
        }

        #[test]
        fn control_frame_is_a_whole_message() {
            let mut message = IncomingMessage::new();
            message.push_frame(Frame::close("").unwrap()).unwrap();

            assert!(message.is_ready());
            assert_eq!(message.kind(), Some(MessageKind::Close));
        }

        #[test]
        fn incomplete_message_refuses_into_parts() {
            let mut message = IncomingMessage::new();
            message
                .push_frame(Frame::new(OpCode::Text, b"a".to_vec(), false).unwrap())
                .unwrap();
            assert!(matches!(
                message.into_parts(),
                Err(WsError::InvalidSequence { .. })
            ));
        }
    }

    mod outgoing {
        use super::*;

        #[test]
        fn short_text_is_one_final_frame() {
            let message = OutgoingMessage::text("hello").unwrap();
            let frames = message.frames();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].opcode(), OpCode::Text);
            assert!(frames[0].fin());
        }

        #[test]
        fn empty_payload_still_emits_one_final_frame() {
            let message = OutgoingMessage::text("").unwrap();
            let frames = message.frames();
            assert_eq!(frames.len(), 1);
            assert!(frames[0].fin());
            assert!(frames[0].is_empty());
        }

        #[test]
        fn seventy_thousand_bytes_make_three_frames() {
            let message = OutgoingMessage::binary(vec![0xAB; 70000]).unwrap();
            let frames = message.frames();

            assert_eq!(frames.len(), 3);
            assert_eq!(frames[0].len(), 32767);
            assert_eq!(frames[1].len(), 32767);
            assert_eq!(frames[2].len(), 4466);

            assert_eq!(frames[0].opcode(), OpCode::Binary);
            assert_eq!(frames[1].opcode(), OpCode::Continuation);
            assert_eq!(frames[2].opcode(), OpCode::Continuation);

            assert!(!frames[0].fin());
            assert!(!frames[1].fin());
            assert!(frames[2].fin());
        }

        #[test]
        fn add_data_extends_the_last_frame_under_the_bound() {
            let mut message = OutgoingMessage::text("start ").unwrap();
            message.add_data(b"and more").unwrap();

            let frames = message.frames();
            assert_eq!(frames.len(), 1);
            assert!(frames[0].fin());
            assert_eq!(frames[0].payload(), b"start and more");
        }

        #[test]
        fn add_data_past_the_bound_opens_a_continuation() {
            let mut message = OutgoingMessage::text(vec![b'a'; 32760]).unwrap();
            message.add_data(&[b'b'; 20]).unwrap();

            let frames = message.frames();
            assert_eq!(frames.len(), 2);
            assert_eq!(frames[0].len(), 32767);
            assert!(!frames[0].fin());
            assert_eq!(frames[1].opcode(), OpCode::Continuation);
            assert_eq!(frames[1].len(), 13);
            assert!(frames[1].fin());
        }

        #[test]
        fn add_data_to_a_full_frame_goes_entirely_to_the_new_one() {
            let mut message = OutgoingMessage::text(vec![b'a'; 32767]).unwrap();
            message.add_data(b"tail").unwrap();

            let frames = message.frames();
            assert_eq!(frames.len(), 2);
            assert!(!frames[0].fin());
            assert_eq!(frames[1].payload(), b"tail");
            assert!(frames[1].fin());
        }

        #[test]
        fn add_data_of_nothing_changes_nothing() {
            let mut message = OutgoingMessage::text("x").unwrap();
            message.add_data(b"").unwrap();
            assert_eq!(message.frames().len(), 1);
        }
    }

    mod round_trip {
        use super::*;

        #[test]
        fn fragmented_message_reassembles_exactly() {
            let payload = (0..70000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();
            let outgoing = OutgoingMessage::binary(payload.clone()).unwrap();
            assert_eq!(outgoing.frames().len(), 3);

            let mut decoder = FrameDecoder::new();
            decoder.feed(&outgoing.encode());

            let mut incoming = IncomingMessage::new();
            while let Some(frame) = decoder.try_next().unwrap() {
                incoming.push_frame(frame).unwrap();
            }

            let (kind, reassembled) = incoming.into_parts().unwrap();
            assert_eq!(kind, MessageKind::Binary);
            assert_eq!(reassembled, payload);
        }
    }
}
