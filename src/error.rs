use std::fmt;
use std::path::PathBuf;

use crate::grid::GridCoord;

/// A convenient result type wrapping [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct CorruptChunkError {
    pub coord: GridCoord,
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for CorruptChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Terrain chunk {} at {} is corrupt: {}",
            self.coord,
            self.path.display(),
            self.reason
        )
    }
}

impl std::error::Error for CorruptChunkError {}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidConfig(String),
    MissingSave(PathBuf),
    CorruptChunk(CorruptChunkError),
    ReadbackFailed(GridCoord),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "Terrain I/O error: {}", err),
            Error::Json(err) => write!(f, "Terrain config parse error: {}", err),
            Error::InvalidConfig(reason) => write!(f, "Invalid terrain config: {}", reason),
            Error::MissingSave(path) => {
                write!(f, "No terrain save found at {}", path.display())
            }
            Error::CorruptChunk(err) => err.fmt(f),
            Error::ReadbackFailed(coord) => {
                write!(f, "Readback of terrain chunk {} failed", coord)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::CorruptChunk(err) => Some(err),
            Error::InvalidConfig(_) | Error::MissingSave(_) | Error::ReadbackFailed(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}

impl From<CorruptChunkError> for Error {
    fn from(value: CorruptChunkError) -> Self {
        Error::CorruptChunk(value)
    }
}
