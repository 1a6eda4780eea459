use crate::header::id16;
use serde::{Serialize, Serializer};

id16!(
    /// Content-derived identifier of a source file. Only ever compared for equality.
    FileId
);

impl Serialize for FileId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Snapshot of a protected file as described by a file-description packet.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub file_id: FileId,
    pub name: String,
    pub size: u64,
    #[serde(serialize_with = "hex16")]
    pub hash_full: [u8; 16],
    #[serde(serialize_with = "hex16")]
    pub hash_16k: [u8; 16],
}

fn hex16<S: Serializer>(b: &[u8; 16], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(b))
}
