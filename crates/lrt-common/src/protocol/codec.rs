//! Frame codec and stream framing
//!
//! [`encode`] and [`decode`] are the pure, bit-packed frame codec.
//! [`PacketCodec`] adds the length prefix used on streams:
//!
//! ```text
//! +------------------+----------------------------+
//! | Length (4B BE)   | Frame (6 + DLen bytes)     |
//! +------------------+----------------------------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{DecodeError, FramingError, LrtError, Result};
use crate::protocol::packet::{Flags, Packet, PacketHeader};
use crate::protocol::{HEADER_LEN, LENGTH_PREFIX_LEN, MAX_FRAME_LEN};

/// Serialize a packet into a new frame
pub fn encode(packet: &Packet) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + packet.destination().len());
    encode_into(packet, &mut buf);
    buf.freeze()
}

/// Append a packet's frame to `dst`
pub fn encode_into(packet: &Packet, dst: &mut BytesMut) {
    let header = packet.header();
    dst.reserve(HEADER_LEN + header.destination_length as usize);
    dst.put_u16(header.transaction_id);
    dst.put_u8(header.flags.to_byte());
    dst.put_u16(header.train_number);
    dst.put_u8(header.destination_length);
    dst.put_slice(packet.destination().as_bytes());
}

/// Parse the fixed header at the start of `buf`
pub fn decode_header(buf: &[u8]) -> std::result::Result<PacketHeader, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::TruncatedHeader { len: buf.len() });
    }

    let mut cursor = &buf[..HEADER_LEN];
    Ok(PacketHeader {
        transaction_id: cursor.get_u16(),
        flags: Flags::from_byte(cursor.get_u8()),
        train_number: cursor.get_u16(),
        destination_length: cursor.get_u8(),
    })
}

/// Parse one frame. Bytes past the declared destination are ignored.
pub fn decode(buf: &[u8]) -> std::result::Result<Packet, DecodeError> {
    let header = decode_header(buf)?;

    let declared = header.destination_length as usize;
    let body = &buf[HEADER_LEN..];
    if body.len() < declared {
        return Err(DecodeError::TruncatedBody {
            declared,
            available: body.len(),
        });
    }

    let destination = std::str::from_utf8(&body[..declared])
        .map_err(|_| DecodeError::NonAsciiDestination)?;

    Packet::from_parts(
        header.transaction_id,
        header.flags,
        header.train_number,
        destination,
    )
    .map_err(|_| DecodeError::NonAsciiDestination)
}

/// Length-prefixed framing of packets on a byte stream
///
/// The decoder only hands complete frames to [`decode`], however the
/// transport splits or coalesces the bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl PacketCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = LrtError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Need at least the length prefix
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        // Peek at the length (don't consume yet)
        let mut length_bytes = [0u8; LENGTH_PREFIX_LEN];
        length_bytes.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if !(HEADER_LEN..=MAX_FRAME_LEN).contains(&length) {
            return Err(FramingError::InvalidLength {
                length,
                min: HEADER_LEN,
                max: MAX_FRAME_LEN,
            }
            .into());
        }

        let total_size = LENGTH_PREFIX_LEN + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let frame = src.split_to(length);

        let expected = HEADER_LEN + frame[HEADER_LEN - 1] as usize;
        if length != expected {
            return Err(FramingError::LengthMismatch { length, expected }.into());
        }

        Ok(Some(decode(&frame)?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(packet) = self.decode(src)? {
            return Ok(Some(packet));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let expected = if src.len() < LENGTH_PREFIX_LEN {
            LENGTH_PREFIX_LEN
        } else {
            let mut length_bytes = [0u8; LENGTH_PREFIX_LEN];
            length_bytes.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
            LENGTH_PREFIX_LEN + u32::from_be_bytes(length_bytes) as usize
        };
        Err(FramingError::TruncatedFrame {
            received: src.len(),
            expected,
        }
        .into())
    }
}

impl<'a> Encoder<&'a Packet> for PacketCodec {
    type Error = LrtError;

    fn encode(&mut self, item: &'a Packet, dst: &mut BytesMut) -> Result<()> {
        let length = HEADER_LEN + item.destination().len();

        dst.reserve(LENGTH_PREFIX_LEN + length);
        dst.put_u32(length as u32);
        encode_into(item, dst);

        Ok(())
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = LrtError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&Packet>::encode(self, &item, dst)
    }
}
