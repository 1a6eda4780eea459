//! Reading and verifying PAR2 recovery files: packet framing, the packet type
//! registry, lazily verified recovery slices and recovery volume addressing.

pub mod error;
pub mod header;
pub mod packet;
pub mod reader;
pub mod registry;
pub mod source;
pub mod stream;
pub mod verify;
pub mod volume;

pub use error::{Error, FramingError, Result};
pub use header::{PacketHeader, PacketTypeId, RecoverySetId};
pub use packet::{FileDescriptionPacket, Packet, RecoverySlicePacket};
pub use reader::{PacketReader, ReaderConfig};
pub use registry::{PacketKind, PacketRegistry};
pub use source::{FileId, SourceFile};
pub use stream::{Location, LocalStreamSource, StreamSource};
pub use volume::{ExponentRange, RecoveryFile};
