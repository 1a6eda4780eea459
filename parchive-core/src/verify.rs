use crate::error::{FramingError, Result};
use crate::header::{PacketHeader, HASHED_FROM};
use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

/// MD5 over the packet body as stored in the stream: every byte from the
/// recovery set id to the end of the packet. Nothing parsed is trusted here.
pub fn body_hash<R>(stream: &mut R, header: &PacketHeader) -> Result<[u8; 16]>
where
    R: Read + Seek + ?Sized,
{
    let want = header.length.saturating_sub(HASHED_FROM);
    stream.seek(SeekFrom::Start(header.offset.saturating_add(HASHED_FROM)))?;
    let mut ctx = md5::Context::new();
    let got = io::copy(&mut (&mut *stream).take(want), &mut ctx)?;
    if got < want {
        return Err(FramingError::Truncated {
            offset: header.offset,
            expected: header.length,
            available: HASHED_FROM + got,
        }
        .into());
    }
    Ok(ctx.compute().0)
}

/// True iff the stored hash matches the body. Leaves the stream position
/// at the end of the packet.
pub fn verify<R: Read + Seek + ?Sized>(stream: &mut R, header: &PacketHeader) -> Result<bool> {
    let ok = body_hash(stream, header)? == header.hash;
    debug!(offset = header.offset, ok, "packet verification");
    Ok(ok)
}
