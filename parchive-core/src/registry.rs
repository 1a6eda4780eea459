use crate::error::Result;
use crate::header::{PacketHeader, PacketTypeId};
use crate::packet::{self, Packet};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::OnceLock;

/// Discriminator for the packet variants a registry can decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Main,
    FileDescription,
    InputFileSliceChecksum,
    RecoverySlice,
    Creator,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacketKind::Main => "main",
            PacketKind::FileDescription => "file-description",
            PacketKind::InputFileSliceChecksum => "slice-checksum",
            PacketKind::RecoverySlice => "recovery-slice",
            PacketKind::Creator => "creator",
        };
        f.write_str(s)
    }
}

/// Decodes the payload of one packet type. The reader is limited to the payload.
pub type DecodeFn = fn(&PacketHeader, &mut dyn Read) -> Result<Packet>;

#[derive(Clone, Copy)]
pub struct PacketDecoder {
    pub kind: PacketKind,
    pub decode: DecodeFn,
    /// Hash the body while decoding. Off for types whose bulk payload is
    /// verified on access instead.
    pub verify_on_decode: bool,
}

impl fmt::Debug for PacketDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketDecoder")
            .field("kind", &self.kind)
            .field("verify_on_decode", &self.verify_on_decode)
            .finish()
    }
}

/// Maps packet type ids to decoders.
#[derive(Debug, Default, Clone)]
pub struct PacketRegistry {
    by_type: HashMap<PacketTypeId, PacketDecoder>,
    by_kind: HashMap<PacketKind, PacketTypeId>,
}

impl PacketRegistry {
    /// An empty registry; every type resolves as unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the five standard PAR2 2.0 packet types.
    pub fn with_standard_packets() -> Self {
        let mut reg = Self::new();
        reg.register(
            packet::MAIN_TYPE,
            PacketDecoder {
                kind: PacketKind::Main,
                decode: packet::decode_main,
                verify_on_decode: true,
            },
        );
        reg.register(
            packet::FILE_DESCRIPTION_TYPE,
            PacketDecoder {
                kind: PacketKind::FileDescription,
                decode: packet::decode_file_description,
                verify_on_decode: true,
            },
        );
        reg.register(
            packet::IFSC_TYPE,
            PacketDecoder {
                kind: PacketKind::InputFileSliceChecksum,
                decode: packet::decode_ifsc,
                verify_on_decode: true,
            },
        );
        reg.register(
            packet::RECOVERY_SLICE_TYPE,
            PacketDecoder {
                kind: PacketKind::RecoverySlice,
                decode: packet::decode_recovery_slice,
                verify_on_decode: false,
            },
        );
        reg.register(
            packet::CREATOR_TYPE,
            PacketDecoder {
                kind: PacketKind::Creator,
                decode: packet::decode_creator,
                verify_on_decode: true,
            },
        );
        reg
    }

    /// Process-wide standard registry, built on first use and read-only after.
    pub fn standard() -> &'static PacketRegistry {
        static STANDARD: OnceLock<PacketRegistry> = OnceLock::new();
        STANDARD.get_or_init(Self::with_standard_packets)
    }

    /// Associate `type_id` with a decoder. Returns the decoder it replaces.
    pub fn register(
        &mut self,
        type_id: PacketTypeId,
        decoder: PacketDecoder,
    ) -> Option<PacketDecoder> {
        let prev = self.by_type.insert(type_id, decoder);
        if let Some(old) = prev {
            if self.by_kind.get(&old.kind) == Some(&type_id) {
                self.by_kind.remove(&old.kind);
            }
        }
        self.by_kind.insert(decoder.kind, type_id);
        prev
    }

    /// Decoder for `type_id`, or `None` for a type this registry does not know.
    pub fn resolve(&self, type_id: &PacketTypeId) -> Option<&PacketDecoder> {
        self.by_type.get(type_id)
    }

    /// Type id registered for a variant, for reads that only want that kind.
    pub fn packet_type(&self, kind: PacketKind) -> Option<PacketTypeId> {
        self.by_kind.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
