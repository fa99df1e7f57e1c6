//! Wire protocol definitions for LRT PIDS
//!
//! ## Frame Format
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+--------...
//! | Transaction ID  | Flags  | Train Number    | DLen   | Destination (DLen bytes)
//! +--------+--------+--------+--------+--------+--------+--------...
//! ```
//!
//! Flag byte: bit 5 ack, bit 4 new, bit 3 update, bit 2 delete,
//! bit 1 arriving, bit 0 departing. Bits 6-7 are always zero on the wire.
//!
//! On a stream every frame is preceded by a 4-byte big-endian length so that
//! the reader never depends on one read returning exactly one frame.
//!
//! ## Security
//!
//! This protocol MUST only be used over encrypted transports (QUIC/TLS).

pub mod codec;
pub mod io;
pub mod packet;

pub use codec::{decode, encode, PacketCodec};
pub use io::{read_packet, write_packet};
pub use packet::{Flags, Packet, PacketHeader, TrainEvent};

/// Fixed header size of a frame
pub const HEADER_LEN: usize = 6;

/// Longest destination a frame can carry
pub const MAX_DESTINATION_LEN: usize = u8::MAX as usize;

/// Largest frame body the length prefix may announce
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_DESTINATION_LEN;

/// Size of the length prefix in front of each frame on a stream
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Initial receive buffer for a single exchange
pub const RECV_BUFFER_SIZE: usize = 2048;
