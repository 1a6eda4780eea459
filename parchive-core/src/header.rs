use crate::error::{FramingError, Result};
use std::io::{ErrorKind, Read, Seek};

/// Constants for the header common to every PAR2 packet
pub const MAGIC: &[u8; 8] = b"PAR2\0PKT";
pub const HEADER_LEN: u64 = 8 + 8 + 16 + 16 + 16; // magic + length + hash + set id + type

/// Offset of the stored hash within the header
pub const HASH_OFFSET: usize = 16;
/// First byte covered by the packet hash (the recovery set id)
pub const HASHED_FROM: u64 = 32;

const SET_ID_OFFSET: usize = 32;
const TYPE_OFFSET: usize = 48;

macro_rules! id16 {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }
        }

        impl From<[u8; 16]> for $name {
            fn from(b: [u8; 16]) -> Self {
                Self(b)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&::hex::encode(self.0))
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}
pub(crate) use id16;

id16!(
    /// Identifier shared by every packet of one recovery set.
    RecoverySetId
);
id16!(
    /// 16-byte packet type signature, e.g. `PAR 2.0\0RecvSlic`.
    PacketTypeId
);

impl PacketTypeId {
    /// Build a type id from its two little-endian 64-bit words.
    pub fn from_words(lo: u64, hi: u64) -> Self {
        let mut b = [0u8; 16];
        b[..8].copy_from_slice(&lo.to_le_bytes());
        b[8..].copy_from_slice(&hi.to_le_bytes());
        Self(b)
    }

    /// Printable form of the signature (NULs shown as `.`).
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect()
    }
}

/// Decoded fixed header. `offset` is where the magic starts in the stream; the
/// payload is not read here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub offset: u64,
    pub length: u64,
    pub hash: [u8; 16],
    pub set_id: RecoverySetId,
    pub type_id: PacketTypeId,
}

impl PacketHeader {
    pub fn payload_offset(&self) -> u64 {
        self.offset.saturating_add(HEADER_LEN)
    }

    /// Zero for a header whose length does not even cover the header itself.
    pub fn payload_len(&self) -> u64 {
        self.length.saturating_sub(HEADER_LEN)
    }

    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Decode a header from its raw 64 bytes found at `offset`.
    pub fn parse(
        offset: u64,
        raw: &[u8; HEADER_LEN as usize],
    ) -> std::result::Result<Self, FramingError> {
        if &raw[..8] != MAGIC {
            return Err(FramingError::BadMagic { offset });
        }
        let mut len8 = [0u8; 8];
        len8.copy_from_slice(&raw[8..16]);
        let length = u64::from_le_bytes(len8);
        if length < HEADER_LEN {
            return Err(FramingError::LengthTooSmall { offset, length });
        }
        let mut hash = [0u8; 16];
        hash.copy_from_slice(&raw[HASH_OFFSET..HASH_OFFSET + 16]);
        let mut set_id = [0u8; 16];
        set_id.copy_from_slice(&raw[SET_ID_OFFSET..SET_ID_OFFSET + 16]);
        let mut type_id = [0u8; 16];
        type_id.copy_from_slice(&raw[TYPE_OFFSET..TYPE_OFFSET + 16]);
        Ok(Self {
            offset,
            length,
            hash,
            set_id: RecoverySetId(set_id),
            type_id: PacketTypeId(type_id),
        })
    }

    /// Read a header at the current stream position.
    ///
    /// Returns `Ok(None)` on a clean end of stream (no bytes left) and
    /// `FramingError::Truncated` if the stream ends inside the header.
    pub fn read_from<R: Read + Seek>(r: &mut R) -> Result<Option<Self>> {
        let offset = r.stream_position()?;
        let mut raw = [0u8; HEADER_LEN as usize];
        let got = read_full(r, &mut raw)?;
        if got == 0 {
            return Ok(None);
        }
        if got < raw.len() {
            let available = got as u64;
            return Err(FramingError::Truncated { offset, expected: HEADER_LEN, available }.into());
        }
        Ok(Some(Self::parse(offset, &raw)?))
    }
}

/// Fill `buf` until it is full or the reader hits EOF; returns bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}
