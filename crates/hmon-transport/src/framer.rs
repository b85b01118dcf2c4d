//! DRP-T frame codec: `[u32 total_length][4-byte magic "HMON"][payload]`.
//!
//! `total_length` counts the whole frame on the wire, including the 4 bytes
//! used to encode itself (`8 + len(payload)`). Wired up through
//! `tokio_util::codec` so a `Framer` composes with `Framed<TcpStream,
//! Framer>` the same way any other length-delimited protocol would in this
//! codebase.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

const MAGIC: &[u8; 4] = b"HMON";
const LENGTH_PREFIX_LEN: usize = 4;
const MAGIC_LEN: usize = 4;

/// Refuses to allocate for a frame announcing a payload larger than this.
/// A live interpreter process has no reason to ever emit gigabytes in a
/// single fact/notification frame; this bounds a hostile or corrupted
/// length prefix.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("frame magic was {found:?}, expected {MAGIC:?}")]
    BadMagic { found: [u8; 4] },

    #[error("frame announced {0} bytes, exceeding the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),

    #[error("frame announced total_length {0}, too short to hold the length prefix and magic")]
    TooShort(usize),
}

/// A stateless `Decoder`/`Encoder` for DRP-T frames. The decoded/encoded
/// item is the frame's payload, with the length prefix and magic stripped
/// or added.
#[derive(Debug, Default, Clone, Copy)]
pub struct Framer;

impl Decoder for Framer {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        // `total_length` counts the whole frame, including the 4 bytes used
        // to encode itself (spec: `8 + len(payload)`).
        let total_length = u32::from_be_bytes(src[..LENGTH_PREFIX_LEN].try_into().unwrap()) as usize;
        if total_length < LENGTH_PREFIX_LEN + MAGIC_LEN {
            return Err(FrameError::TooShort(total_length));
        }
        let payload_len = total_length - LENGTH_PREFIX_LEN - MAGIC_LEN;
        if payload_len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(payload_len));
        }

        if src.len() < total_length {
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total_length);
        frame.advance(LENGTH_PREFIX_LEN);
        let magic = &frame[..MAGIC_LEN];
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(FrameError::BadMagic { found });
        }
        frame.advance(MAGIC_LEN);
        Ok(Some(frame.freeze()))
    }
}

impl Encoder<Bytes> for Framer {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(item.len()));
        }
        let total_length = (LENGTH_PREFIX_LEN + MAGIC_LEN + item.len()) as u32;
        dst.reserve(LENGTH_PREFIX_LEN + MAGIC_LEN + item.len());
        dst.put_u32(total_length);
        dst.put_slice(MAGIC);
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_then_decodes_one_frame() {
        let mut framer = Framer;
        let mut buf = BytesMut::new();
        framer.encode(Bytes::from_static(b"hello"), &mut buf).unwrap();
        let total_length = u32::from_be_bytes(buf[..4].try_into().unwrap());
        assert_eq!(total_length, 8 + 5);
        assert_eq!(&buf[4..8], MAGIC);

        let decoded = framer.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_more_bytes_on_partial_frame() {
        let mut framer = Framer;
        let mut buf = BytesMut::new();
        framer.encode(Bytes::from_static(b"hello world"), &mut buf).unwrap();
        let mut partial = buf.split_to(6);
        assert!(framer.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut framer = Framer;
        let mut buf = BytesMut::new();
        buf.put_u32(8);
        buf.put_slice(b"NOPE");
        assert!(matches!(framer.decode(&mut buf), Err(FrameError::BadMagic { .. })));
    }

    #[test]
    fn rejects_oversized_frame() {
        let mut framer = Framer;
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_LEN + LENGTH_PREFIX_LEN + MAGIC_LEN + 1) as u32);
        assert!(matches!(framer.decode(&mut buf), Err(FrameError::TooLarge(_))));
    }

    #[test]
    fn rejects_total_length_shorter_than_header() {
        let mut framer = Framer;
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        assert!(matches!(framer.decode(&mut buf), Err(FrameError::TooShort(3))));
    }
}
