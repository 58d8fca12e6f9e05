//! Crate-wide error type
//!
//! Construction and query failures are surfaced to the immediate caller; there
//! is no retry logic anywhere in this crate, so a failed operation leaves no
//! partial tree or partial file state worth recovering.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum Error {
    EmptyDataset,
    ZeroNeighbors,
    NeighborCountExceedsDataset { requested: usize, available: usize },
    DimensionMismatch { expected: usize, found: usize },
    ArenaFull { capacity: usize },
    OffsetOutOfBounds { offset: usize, len: usize },
    TreeNotBuilt,
    AlreadyBuilt,
    Corrupt(String),
    Io { path: PathBuf, source: io::Error },
}

impl Error {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyDataset => write!(f, "dataset contains no points"),
            Error::ZeroNeighbors => write!(f, "neighbor count must be at least 1"),
            Error::NeighborCountExceedsDataset {
                requested,
                available,
            } => {
                write!(
                    f,
                    "batch neighbor count {} exceeds the {} points available per query",
                    requested, available
                )
            }
            Error::DimensionMismatch { expected, found } => {
                write!(
                    f,
                    "query dimension {} does not match tree dimension {}",
                    found, expected
                )
            }
            Error::ArenaFull { capacity } => {
                write!(f, "arena capacity of {} nodes exhausted", capacity)
            }
            Error::OffsetOutOfBounds { offset, len } => {
                write!(f, "offset {} out of bounds for region of {} slots", offset, len)
            }
            Error::TreeNotBuilt => write!(f, "tree has not been built yet"),
            Error::AlreadyBuilt => write!(f, "tree has already been built"),
            Error::Corrupt(msg) => write!(f, "corrupt on-disk state: {}", msg),
            Error::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
