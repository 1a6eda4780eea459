use crate::error::{Error, FramingError, Result};
use crate::header::PacketHeader;
use crate::packet::{Packet, RecoverySlicePacket};
use crate::registry::{PacketDecoder, PacketKind, PacketRegistry};
use crate::verify;
use std::io::{Read, Seek, SeekFrom};
use std::iter::FusedIterator;
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug)]
pub struct ReaderConfig {
    /// Packets declaring a larger length are rejected as framing errors.
    pub max_packet_len: u64,
    /// Set to false when the stream is trusted out of band; decoding then skips
    /// body hashing. Recovery slice data is verified on access regardless.
    pub verify_on_decode: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { max_packet_len: 2 * 1024 * 1024 * 1024, verify_on_decode: true }
    }
}

/// Sequential packet decoder over one owned, seekable stream.
pub struct PacketReader<'reg, R> {
    inner: R,
    registry: &'reg PacketRegistry,
    config: ReaderConfig,
    pos: u64,
    stream_len: u64,
}

impl<R: Read + Seek> PacketReader<'static, R> {
    /// Reader over `inner` from its current position, using the standard registry.
    pub fn new(inner: R) -> Result<Self> {
        PacketReader::with_registry(inner, PacketRegistry::standard(), ReaderConfig::default())
    }
}

impl<'reg, R: Read + Seek> PacketReader<'reg, R> {
    pub fn with_registry(
        mut inner: R,
        registry: &'reg PacketRegistry,
        config: ReaderConfig,
    ) -> Result<Self> {
        let pos = inner.stream_position()?;
        let stream_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self { inner, registry, config, pos, stream_len })
    }

    /// Offset of the next packet boundary.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn stream_len(&self) -> u64 {
        self.stream_len
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.stream_len
    }

    pub fn registry(&self) -> &'reg PacketRegistry {
        self.registry
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Decode the next header and check it against the limits and stream length.
    /// The position is not advanced; call [`skip`](Self::skip) or one of the
    /// `read_packet*` methods to move on.
    pub fn next_header(&mut self) -> Result<Option<PacketHeader>> {
        if self.is_at_end() {
            return Ok(None);
        }
        self.inner.seek(SeekFrom::Start(self.pos))?;
        let Some(header) = PacketHeader::read_from(&mut self.inner)? else {
            return Ok(None);
        };
        if header.length > self.config.max_packet_len {
            return Err(FramingError::TooLarge {
                offset: header.offset,
                length: header.length,
                limit: self.config.max_packet_len,
            }
            .into());
        }
        match header.offset.checked_add(header.length) {
            Some(end) if end <= self.stream_len => Ok(Some(header)),
            _ => Err(FramingError::Truncated {
                offset: header.offset,
                expected: header.length,
                available: self.stream_len - header.offset,
            }
            .into()),
        }
    }

    /// Move past `header` without decoding it.
    pub fn skip(&mut self, header: &PacketHeader) {
        self.pos = header.end();
    }

    /// Next packet of any registered type. Unknown types are skipped.
    /// `Ok(None)` means the stream is exhausted.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        while let Some(header) = self.next_header()? {
            match self.registry.resolve(&header.type_id) {
                Some(decoder) => {
                    let decoder = *decoder;
                    return self.decode(&header, &decoder).map(Some);
                }
                None => {
                    trace!(
                        offset = header.offset,
                        packet_type = %header.type_id.label(),
                        "skipping unknown packet type"
                    );
                    self.skip(&header);
                }
            }
        }
        Ok(None)
    }

    /// Next packet of `kind`, skipping every other type.
    pub fn read_packet_of(&mut self, kind: PacketKind) -> Result<Option<Packet>> {
        let wanted = self
            .registry
            .packet_type(kind)
            .ok_or_else(|| {
                Error::InvalidOperation(format!("no packet type registered for {kind}"))
            })?;
        let decoder = *self
            .registry
            .resolve(&wanted)
            .ok_or_else(|| Error::InvalidOperation(format!("no decoder registered for {kind}")))?;
        while let Some(header) = self.next_header()? {
            if header.type_id != wanted {
                trace!(
                    offset = header.offset,
                    packet_type = %header.type_id.label(),
                    "skipping packet"
                );
                self.skip(&header);
                continue;
            }
            return self.decode(&header, &decoder).map(Some);
        }
        Ok(None)
    }

    /// Hash check of the packet at `header` through this reader's stream.
    pub fn verify(&mut self, header: &PacketHeader) -> Result<bool> {
        verify::verify(&mut self.inner, header)
    }

    /// Verified recovery data of a slice read from this stream.
    pub fn recovery_data(&mut self, slice: &RecoverySlicePacket) -> Result<Vec<u8>> {
        slice.recovery_data(&mut self.inner)
    }

    /// Iterate over every remaining packet.
    pub fn packets(self) -> Packets<'reg, R> {
        Packets { reader: self, done: false }
    }

    fn decode(&mut self, header: &PacketHeader, decoder: &PacketDecoder) -> Result<Packet> {
        // The length is already bounds-checked, so the next boundary is known
        // whether or not the body turns out to be usable.
        self.pos = header.end();
        let check = decoder.verify_on_decode && self.config.verify_on_decode;
        if check && !verify::verify(&mut self.inner, header)? {
            warn!(offset = header.offset, kind = %decoder.kind, "packet failed verification");
            return Err(Error::Integrity {
                offset: header.offset,
                reason: format!("{} packet failed verification", decoder.kind),
            });
        }
        self.inner.seek(SeekFrom::Start(header.payload_offset()))?;
        let mut body = (&mut self.inner).take(header.payload_len());
        (decoder.decode)(header, &mut body)
    }
}

/// Iterator over the packets of a stream.
///
/// Ends after a framing or I/O error. Integrity and malformed-body errors are
/// yielded and the scan carries on with the next packet.
pub struct Packets<'reg, R> {
    reader: PacketReader<'reg, R>,
    done: bool,
}

impl<'reg, R> Packets<'reg, R> {
    pub fn reader(&self) -> &PacketReader<'reg, R> {
        &self.reader
    }

    pub fn into_reader(self) -> PacketReader<'reg, R> {
        self.reader
    }
}

impl<'reg, R: Read + Seek> Packets<'reg, R> {
    pub fn recovery_data(&mut self, slice: &RecoverySlicePacket) -> Result<Vec<u8>> {
        self.reader.recovery_data(slice)
    }
}

impl<'reg, R: Read + Seek> Iterator for Packets<'reg, R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_packet() {
            Ok(Some(p)) => Some(Ok(p)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                if !e.is_recoverable() {
                    self.done = true;
                }
                Some(Err(e))
            }
        }
    }
}

impl<'reg, R: Read + Seek> FusedIterator for Packets<'reg, R> {}
