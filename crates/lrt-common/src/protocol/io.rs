//! Async packet reading/writing on transport streams

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Encoder, FramedRead};

use crate::error::Result;
use crate::protocol::codec::PacketCodec;
use crate::protocol::packet::Packet;
use crate::protocol::{LENGTH_PREFIX_LEN, MAX_FRAME_LEN, RECV_BUFFER_SIZE};

/// Read a single length-prefixed packet from a receive stream
///
/// Keeps reading until the whole frame has arrived. Returns `Ok(None)` if
/// the peer finished the stream without sending anything.
pub async fn read_packet<R>(recv: &mut R) -> Result<Option<Packet>>
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::with_capacity(recv, PacketCodec::new(), RECV_BUFFER_SIZE);
    framed.next().await.transpose()
}

/// Write a single packet and half-close the send direction
///
/// The peer observes every byte followed by end-of-stream, so no delay is
/// needed before the stream is dropped.
pub async fn write_packet<W>(send: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + MAX_FRAME_LEN);
    PacketCodec::new().encode(packet, &mut frame)?;

    send.write_all(&frame).await?;
    send.flush().await?;
    send.shutdown().await?;

    Ok(())
}
