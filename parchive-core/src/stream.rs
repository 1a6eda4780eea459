//! Locations and content stream acquisition.

use crate::error::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use url::Url;

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A readable, seekable stream owned by whoever acquired it; dropping it releases it.
pub type ContentStream = Box<dyn ReadSeek + Send>;

/// Where a recovery volume lives: a local path or a URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Path(PathBuf),
    Url(Url),
}

impl Location {
    /// Hierarchical URIs become `Url`. Anything else is a path, including `C:\...`,
    /// `name:with-colon.par2` and any reference naming an existing local file.
    pub fn parse(reference: &str) -> Self {
        let local = Path::new(reference);
        match Url::parse(reference) {
            Ok(url) if url.scheme().len() > 1 && !url.cannot_be_a_base() && !local.exists() => {
                Location::Url(url)
            }
            _ => Location::Path(PathBuf::from(reference)),
        }
    }

    /// Local filesystem path, if this location has one.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self {
            Location::Path(p) => Some(p.clone()),
            Location::Url(u) if u.scheme() == "file" => u.to_file_path().ok(),
            Location::Url(_) => None,
        }
    }

    /// Final path component, percent-decoded for URIs.
    pub fn file_name(&self) -> Option<String> {
        if let Some(p) = self.local_path() {
            return p.file_name().map(|n| n.to_string_lossy().into_owned());
        }
        let Location::Url(u) = self else { return None };
        let last = u.path_segments()?.last().filter(|s| !s.is_empty())?;
        Some(urlencoding::decode(last).map(|s| s.into_owned()).unwrap_or_else(|_| last.to_string()))
    }

    pub fn is_absolute(&self) -> bool {
        match self {
            Location::Path(p) => p.is_absolute(),
            Location::Url(_) => true,
        }
    }
}

impl From<PathBuf> for Location {
    fn from(p: PathBuf) -> Self {
        Location::Path(p)
    }
}

impl From<&Path> for Location {
    fn from(p: &Path) -> Self {
        Location::Path(p.to_path_buf())
    }
}

impl From<Url> for Location {
    fn from(u: Url) -> Self {
        Location::Url(u)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => write!(f, "{}", p.display()),
            Location::Url(u) => write!(f, "{}", u),
        }
    }
}

/// Acquires content streams for locations. Implementations for remote schemes
/// may block inside `open`; retry policy belongs to them.
pub trait StreamSource {
    fn open(&self, location: &Location) -> Result<ContentStream>;
}

/// Opens local paths and `file://` URIs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStreamSource;

impl StreamSource for LocalStreamSource {
    fn open(&self, location: &Location) -> Result<ContentStream> {
        let Some(path) = location.local_path() else {
            let scheme = match location {
                Location::Url(u) => u.scheme().to_string(),
                Location::Path(_) => String::new(),
            };
            return Err(Error::ResourceUnavailable(format!(
                "no stream source for `{scheme}` location {location}"
            )));
        };
        if !location.is_absolute() && !path.exists() {
            return Err(Error::InvalidOperation(format!(
                "{location} is not absolute and does not resolve to a local file"
            )));
        }
        let f = File::open(&path)
            .map_err(|e| Error::ResourceUnavailable(format!("open {}: {e}", path.display())))?;
        Ok(Box::new(BufReader::new(f)))
    }
}
