//! The closed set of packet variants and their payload decoders.
//!
//! Each decoder receives the already-framed header and a reader limited to the
//! packet payload. Scalar fields are parsed eagerly; the bulk data of a recovery
//! slice is left in the stream and only read through [`RecoverySlicePacket::recovery_data`].

use crate::error::{Error, FramingError, Result};
use crate::header::{PacketHeader, PacketTypeId, RecoverySetId};
use crate::registry::PacketKind;
use crate::source::{FileId, SourceFile};
use crate::verify;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use tracing::debug;

pub const MAIN_TYPE: PacketTypeId = PacketTypeId(*b"PAR 2.0\0Main\0\0\0\0");
pub const FILE_DESCRIPTION_TYPE: PacketTypeId = PacketTypeId(*b"PAR 2.0\0FileDesc");
pub const IFSC_TYPE: PacketTypeId = PacketTypeId(*b"PAR 2.0\0IFSC\0\0\0\0");
pub const RECOVERY_SLICE_TYPE: PacketTypeId = PacketTypeId(*b"PAR 2.0\0RecvSlic");
pub const CREATOR_TYPE: PacketTypeId = PacketTypeId(*b"PAR 2.0\0Creator\0");

const FILE_DESC_FIXED: u64 = 16 + 16 + 16 + 8; // file id + md5 + md5 16k + length
const IFSC_ENTRY: u64 = 16 + 4; // md5 + crc32
const EXPONENT_LEN: u64 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Main(MainPacket),
    FileDescription(FileDescriptionPacket),
    InputFileSliceChecksum(IfscPacket),
    RecoverySlice(RecoverySlicePacket),
    Creator(CreatorPacket),
}

impl Packet {
    pub fn header(&self) -> &PacketHeader {
        match self {
            Packet::Main(p) => &p.header,
            Packet::FileDescription(p) => &p.header,
            Packet::InputFileSliceChecksum(p) => &p.header,
            Packet::RecoverySlice(p) => &p.header,
            Packet::Creator(p) => &p.header,
        }
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Main(_) => PacketKind::Main,
            Packet::FileDescription(_) => PacketKind::FileDescription,
            Packet::InputFileSliceChecksum(_) => PacketKind::InputFileSliceChecksum,
            Packet::RecoverySlice(_) => PacketKind::RecoverySlice,
            Packet::Creator(_) => PacketKind::Creator,
        }
    }

    pub fn set_id(&self) -> RecoverySetId {
        self.header().set_id
    }
}

/// Main packet: slice size and the file ids of the recovery set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MainPacket {
    pub header: PacketHeader,
    pub slice_size: u64,
    pub recoverable: Vec<FileId>,
    pub non_recoverable: Vec<FileId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDescriptionPacket {
    pub header: PacketHeader,
    pub file_id: FileId,
    pub hash_full: [u8; 16],
    pub hash_16k: [u8; 16],
    pub length: u64,
    pub name: String,
}

impl FileDescriptionPacket {
    pub fn to_source_file(&self) -> SourceFile {
        SourceFile {
            file_id: self.file_id,
            name: self.name.clone(),
            size: self.length,
            hash_full: self.hash_full,
            hash_16k: self.hash_16k,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceChecksum {
    pub md5: [u8; 16],
    pub crc32: u32,
}

/// Input file slice checksums for one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfscPacket {
    pub header: PacketHeader,
    pub file_id: FileId,
    pub entries: Vec<SliceChecksum>,
}

/// One recovery slice. Holds the position of its data, never the data itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverySlicePacket {
    pub header: PacketHeader,
    pub exponent: u32,
}

impl RecoverySlicePacket {
    /// Length of the recovery data (payload minus the exponent field).
    pub fn recovery_data_len(&self) -> u64 {
        self.header.payload_len().saturating_sub(EXPONENT_LEN)
    }

    /// Verify the packet and return its recovery data.
    ///
    /// Every call hashes the whole packet body again before reading; on a
    /// mismatch nothing is returned but `Error::Integrity`.
    pub fn recovery_data<R: Read + Seek + ?Sized>(&self, stream: &mut R) -> Result<Vec<u8>> {
        if !verify::verify(stream, &self.header)? {
            debug!(
                offset = self.header.offset,
                exponent = self.exponent,
                "recovery slice failed verification"
            );
            let reason = "verification failed".to_string();
            return Err(Error::Integrity { offset: self.header.offset, reason });
        }
        let data_len = self.recovery_data_len();
        let len = usize::try_from(data_len).map_err(|_| {
            let reason = format!("recovery slice of {data_len} bytes does not fit in memory");
            Error::InvalidOperation(reason)
        })?;
        let end = stream.seek(SeekFrom::End(0))?;
        if end < self.header.end() {
            return Err(FramingError::Truncated {
                offset: self.header.offset,
                expected: self.header.length,
                available: end.saturating_sub(self.header.offset),
            }
            .into());
        }
        stream.seek(SeekFrom::Start(self.header.payload_offset() + EXPONENT_LEN))?;
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatorPacket {
    pub header: PacketHeader,
    pub client: String,
}

fn malformed(h: &PacketHeader, reason: impl Into<String>) -> Error {
    Error::MalformedPacket { offset: h.offset, reason: reason.into() }
}

fn read_exact(h: &PacketHeader, r: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            malformed(h, "body shorter than its declared layout")
        } else {
            e.into()
        }
    })
}

fn read_u32(h: &PacketHeader, r: &mut dyn Read) -> Result<u32> {
    let mut b = [0u8; 4];
    read_exact(h, r, &mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64(h: &PacketHeader, r: &mut dyn Read) -> Result<u64> {
    let mut b = [0u8; 8];
    read_exact(h, r, &mut b)?;
    Ok(u64::from_le_bytes(b))
}

fn read_16(h: &PacketHeader, r: &mut dyn Read) -> Result<[u8; 16]> {
    let mut b = [0u8; 16];
    read_exact(h, r, &mut b)?;
    Ok(b)
}

fn read_rest(h: &PacketHeader, r: &mut dyn Read, len: u64) -> Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(|_| malformed(h, "body does not fit in memory"))?;
    let mut buf = vec![0u8; len];
    read_exact(h, r, &mut buf)?;
    Ok(buf)
}

/// PAR2 strings are NUL-padded to a multiple of four bytes.
fn padded_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

pub(crate) fn decode_main(h: &PacketHeader, r: &mut dyn Read) -> Result<Packet> {
    let body = h.payload_len();
    if body < 12 || (body - 12) % 16 != 0 {
        return Err(malformed(h, format!("main packet body of {body} bytes")));
    }
    let slice_size = read_u64(h, r)?;
    let recoverable_count = read_u32(h, r)? as usize;
    let ids = ((body - 12) / 16) as usize;
    if recoverable_count > ids {
        let reason = format!("{recoverable_count} recoverable files but only {ids} ids");
        return Err(malformed(h, reason));
    }
    let mut recoverable = Vec::with_capacity(recoverable_count);
    let mut non_recoverable = Vec::with_capacity(ids - recoverable_count);
    for i in 0..ids {
        let id = FileId(read_16(h, r)?);
        if i < recoverable_count {
            recoverable.push(id);
        } else {
            non_recoverable.push(id);
        }
    }
    Ok(Packet::Main(MainPacket { header: *h, slice_size, recoverable, non_recoverable }))
}

pub(crate) fn decode_file_description(h: &PacketHeader, r: &mut dyn Read) -> Result<Packet> {
    let body = h.payload_len();
    if body < FILE_DESC_FIXED {
        return Err(malformed(h, format!("file description body of {body} bytes")));
    }
    let file_id = FileId(read_16(h, r)?);
    let hash_full = read_16(h, r)?;
    let hash_16k = read_16(h, r)?;
    let length = read_u64(h, r)?;
    let name = padded_string(&read_rest(h, r, body - FILE_DESC_FIXED)?);
    Ok(Packet::FileDescription(FileDescriptionPacket {
        header: *h,
        file_id,
        hash_full,
        hash_16k,
        length,
        name,
    }))
}

pub(crate) fn decode_ifsc(h: &PacketHeader, r: &mut dyn Read) -> Result<Packet> {
    let body = h.payload_len();
    if body < 16 || (body - 16) % IFSC_ENTRY != 0 {
        return Err(malformed(h, format!("slice checksum body of {body} bytes")));
    }
    let file_id = FileId(read_16(h, r)?);
    let n = ((body - 16) / IFSC_ENTRY) as usize;
    let mut entries = Vec::with_capacity(n);
    for _ in 0..n {
        let md5 = read_16(h, r)?;
        let crc32 = read_u32(h, r)?;
        entries.push(SliceChecksum { md5, crc32 });
    }
    Ok(Packet::InputFileSliceChecksum(IfscPacket { header: *h, file_id, entries }))
}

pub(crate) fn decode_recovery_slice(h: &PacketHeader, r: &mut dyn Read) -> Result<Packet> {
    if h.payload_len() < EXPONENT_LEN {
        return Err(malformed(h, "recovery slice without an exponent"));
    }
    let exponent = read_u32(h, r)?;
    Ok(Packet::RecoverySlice(RecoverySlicePacket { header: *h, exponent }))
}

pub(crate) fn decode_creator(h: &PacketHeader, r: &mut dyn Read) -> Result<Packet> {
    let client = padded_string(&read_rest(h, r, h.payload_len())?);
    Ok(Packet::Creator(CreatorPacket { header: *h, client }))
}
