use binrpc_codec::{extend, Decode, Encode, Limits, Reader, Writer};
use binrpc_transport::Connection;
use bytes::BytesMut;

use crate::error::{FrameError, Result};
use crate::header::{MessageHeader, HEADER_SIZE};
use crate::message::Message;

/// Encode `msg` as one frame at the start of `buf` and return the frame length.
///
/// The header is reserved first, the payload encoded after it, and the header
/// patched in once the body size is known, so the frame is one contiguous
/// region `buf[..len]`.
pub fn encode_frame(buf: &mut BytesMut, msg: &dyn Message, limits: &Limits) -> Result<usize> {
    let mut writer = Writer::new(buf, limits);
    writer.skip(HEADER_SIZE)?;
    msg.encode(&mut writer)?;

    let len = writer.len();
    let body = len - HEADER_SIZE;
    if body == 0 {
        return Err(FrameError::EmptyMessage);
    }
    let body_size = u32::try_from(body).map_err(|_| FrameError::EncodedTooLarge {
        size: body,
        max: u32::MAX as usize,
    })?;

    let header = MessageHeader::new(body_size, msg.command(), msg.version());
    writer.set_position(0)?;
    header.encode(&mut writer)?;
    writer.set_position(len)?;
    Ok(len)
}

/// Read one frame into `buf`.
///
/// The header lands in `buf[..HEADER_SIZE]` and the body in
/// `buf[HEADER_SIZE..HEADER_SIZE + header.body_len()]`. A body of zero bytes
/// or larger than `max_msg_size` is rejected before it is read.
pub fn read_frame<C: Connection + ?Sized>(
    conn: &mut C,
    buf: &mut BytesMut,
    limits: &Limits,
    max_msg_size: usize,
) -> Result<MessageHeader> {
    extend(buf, HEADER_SIZE, limits.growth_slack());
    conn.read_full(&mut buf[..HEADER_SIZE])?;

    let header = Reader::new(&buf[..HEADER_SIZE], limits)
        .and_then(|mut reader| MessageHeader::decode(&mut reader))
        .map_err(FrameError::MalformedHeader)?;

    let size = header.body_len();
    if size == 0 {
        return Err(FrameError::EmptyBody);
    }
    if size > max_msg_size {
        return Err(FrameError::BodyTooLarge {
            size,
            max: max_msg_size,
        });
    }

    let end = HEADER_SIZE + size;
    extend(buf, end, limits.growth_slack());
    conn.read_full(&mut buf[HEADER_SIZE..end])?;
    Ok(header)
}

/// Send the first `len` bytes of `buf` as one frame.
pub fn write_frame<C: Connection + ?Sized>(conn: &mut C, buf: &[u8], len: usize) -> Result<()> {
    conn.write_all(&buf[..len])?;
    Ok(())
}
