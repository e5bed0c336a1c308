use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use warden_core::WardenError;

/// Hard ceiling on a declared frame length. A peer declaring more
/// than this is misbehaving; the connection is dropped rather than
/// attempting an unbounded read.
pub const MAX_FRAME_BYTES: usize = 10_000_000;

/// Length-prefixed frame codec: 4-byte big-endian length, then that
/// many bytes of UTF-8 JSON.
///
/// The decoder yields raw frame bodies; JSON parsing (and the
/// skip-one-bad-envelope policy) belongs to the layer above, so a
/// malformed body never kills the stream the way a corrupt length
/// does.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = WardenError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, WardenError> {
        if src.len() < 4 {
            // Need more — fewer than 4 header bytes so far.
            return Ok(None);
        }

        let mut header = [0u8; 4];
        header.copy_from_slice(&src[..4]);
        let declared = u32::from_be_bytes(header) as usize;

        if declared > MAX_FRAME_BYTES {
            return Err(WardenError::FrameTooLarge {
                declared,
                max: MAX_FRAME_BYTES,
            });
        }

        if src.len() < 4 + declared {
            // Payload not fully arrived yet.
            src.reserve(4 + declared - src.len());
            return Ok(None);
        }

        src.advance(4);
        Ok(Some(src.split_to(declared).freeze()))
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = WardenError;

    fn encode(&mut self, body: &[u8], dst: &mut BytesMut) -> Result<(), WardenError> {
        if body.len() > MAX_FRAME_BYTES {
            return Err(WardenError::FrameTooLarge {
                declared: body.len(),
                max: MAX_FRAME_BYTES,
            });
        }
        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.put_slice(body);
        Ok(())
    }
}
