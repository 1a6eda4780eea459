//! Recovery volumes: what a volume's filename says about it, and lazy
//! enumeration of what it contains.

use crate::error::Result;
use crate::packet::{Packet, RecoverySlicePacket};
use crate::reader::PacketReader;
use crate::registry::PacketKind;
use crate::source::{FileId, SourceFile};
use crate::stream::{ContentStream, LocalStreamSource, Location, StreamSource};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::iter::FusedIterator;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// `<name>[.vol<start>+<count>].par2`; the digit groups may be empty so that
/// a malformed volume segment still yields the set name.
const VOLUME_NAME: &str = r"^(.+?)(?:\.vol([0-9]*)\+([0-9]*))?\.(?i:par2)$";

fn volume_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VOLUME_NAME).expect("volume name pattern is valid"))
}

/// Closed interval of recovery exponents carried by one volume.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExponentRange {
    pub min: u32,
    pub max: u32,
}

impl ExponentRange {
    /// `[start, start + count - 1]`; `None` when `count` is zero or the end overflows.
    pub fn from_start_count(start: u32, count: u32) -> Option<Self> {
        let last = count.checked_sub(1)?;
        Some(Self { min: start, max: start.checked_add(last)? })
    }

    pub fn contains(&self, exponent: u32) -> bool {
        (self.min..=self.max).contains(&exponent)
    }

    /// Number of exponents in the range.
    pub fn count(&self) -> u64 {
        u64::from(self.max - self.min) + 1
    }
}

/// Metadata of one PAR2 file, derived from its location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryFile {
    pub location: Location,
    /// Set name: the base filename without volume segment or extension.
    pub name: String,
    /// Exponents in this volume; `None` for the index file or a non-conforming name.
    pub exponents: Option<ExponentRange>,
}

/// Split a filename into set name and exponent range.
pub fn parse_volume_name(file_name: &str) -> (String, Option<ExponentRange>) {
    let Some(caps) = volume_name_re().captures(file_name) else {
        let stem = Path::new(file_name).file_stem().map(|s| s.to_string_lossy().into_owned());
        return (stem.unwrap_or_else(|| file_name.to_string()), None);
    };
    let name = caps[1].to_string();
    let start = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
    let count = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
    let range = match (start, count) {
        (Some(s), Some(c)) => ExponentRange::from_start_count(s, c),
        _ => None,
    };
    (name, range)
}

impl RecoveryFile {
    /// Build a descriptor from a path or URI reference. Never fails: names
    /// that do not follow the volume convention simply carry no range.
    pub fn from_reference(reference: &str) -> Self {
        Self::from_location(Location::parse(reference))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_location(Location::from(path.as_ref()))
    }

    pub fn from_location(location: Location) -> Self {
        let file_name = location.file_name().unwrap_or_default();
        let (name, exponents) = parse_volume_name(&file_name);
        let location = match location.local_path() {
            Some(p) if p.exists() => match std::fs::canonicalize(&p) {
                Ok(abs) => Location::Path(abs),
                Err(e) => {
                    debug!(path = %p.display(), error = %e, "keeping unresolved location");
                    location
                }
            },
            _ => location,
        };
        Self { location, name, exponents }
    }

    /// True for the index file (no recovery slices by name).
    pub fn is_index(&self) -> bool {
        self.exponents.is_none()
    }

    pub fn content_stream(&self) -> Result<ContentStream> {
        self.content_stream_with(&LocalStreamSource)
    }

    pub fn content_stream_with(&self, source: &dyn StreamSource) -> Result<ContentStream> {
        source.open(&self.location)
    }

    /// Lazily enumerate the distinct source files described in this file.
    pub fn source_files(&self) -> Result<SourceFiles> {
        self.source_files_with(&LocalStreamSource)
    }

    pub fn source_files_with(&self, source: &dyn StreamSource) -> Result<SourceFiles> {
        let reader = PacketReader::new(self.content_stream_with(source)?)?;
        Ok(SourceFiles { reader: Some(reader), seen: HashSet::new() })
    }

    /// Lazily enumerate the recovery slices stored in this file.
    pub fn recovery_slices(&self) -> Result<RecoverySlices> {
        self.recovery_slices_with(&LocalStreamSource)
    }

    pub fn recovery_slices_with(&self, source: &dyn StreamSource) -> Result<RecoverySlices> {
        let reader = PacketReader::new(self.content_stream_with(source)?)?;
        Ok(RecoverySlices { reader, declared: self.exponents, done: false })
    }
}

/// Distinct source files of one PAR2 file, in stream order.
///
/// Holds the stream open until exhausted, then releases it. Stops quietly at
/// end of stream or at the first framing error; file descriptions that fail
/// verification are skipped.
pub struct SourceFiles {
    reader: Option<PacketReader<'static, ContentStream>>,
    seen: HashSet<FileId>,
}

impl SourceFiles {
    fn finish(&mut self) -> Option<SourceFile> {
        self.reader = None;
        None
    }
}

impl Iterator for SourceFiles {
    type Item = SourceFile;

    fn next(&mut self) -> Option<SourceFile> {
        loop {
            let reader = self.reader.as_mut()?;
            match reader.read_packet_of(PacketKind::FileDescription) {
                Ok(Some(Packet::FileDescription(fd))) => {
                    if self.seen.insert(fd.file_id) {
                        return Some(fd.to_source_file());
                    }
                    debug!(file_id = %fd.file_id, "duplicate file description");
                }
                Ok(Some(_)) => continue,
                Ok(None) => return self.finish(),
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "skipping file description");
                }
                Err(e) => {
                    warn!(error = %e, "stopping source file scan");
                    return self.finish();
                }
            }
        }
    }
}

impl FusedIterator for SourceFiles {}

/// Recovery slices of one volume. Slice data is read, verified, through
/// [`RecoverySlices::recovery_data`] while the iterator is alive.
pub struct RecoverySlices {
    reader: PacketReader<'static, ContentStream>,
    declared: Option<ExponentRange>,
    done: bool,
}

impl RecoverySlices {
    pub fn recovery_data(&mut self, slice: &RecoverySlicePacket) -> Result<Vec<u8>> {
        self.reader.recovery_data(slice)
    }

    /// Range declared by the volume's filename.
    pub fn declared(&self) -> Option<ExponentRange> {
        self.declared
    }
}

impl Iterator for RecoverySlices {
    type Item = RecoverySlicePacket;

    fn next(&mut self) -> Option<RecoverySlicePacket> {
        while !self.done {
            match self.reader.read_packet_of(PacketKind::RecoverySlice) {
                Ok(Some(Packet::RecoverySlice(slice))) => {
                    if let Some(range) = self.declared {
                        if !range.contains(slice.exponent) {
                            warn!(
                                exponent = slice.exponent,
                                min = range.min,
                                max = range.max,
                                "recovery slice outside the volume's declared range"
                            );
                        }
                    }
                    return Some(slice);
                }
                Ok(Some(_)) => continue,
                Ok(None) => self.done = true,
                Err(e) if e.is_recoverable() => warn!(error = %e, "skipping recovery slice"),
                Err(e) => {
                    warn!(error = %e, "stopping recovery slice scan");
                    self.done = true;
                }
            }
        }
        None
    }
}

impl FusedIterator for RecoverySlices {}
