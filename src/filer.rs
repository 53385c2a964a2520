//! Save directory layout: `<root>/Terrain/{x}_{z}`, one gzip stream of
//! little-endian [`ModifyState`] records per chunk.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::chunk::ModifyState;
use crate::error::{CorruptChunkError, Error, Result};
use crate::grid::GridCoord;

pub const TERRAIN_DIR: &str = "Terrain";

pub fn terrain_dir(root: &Path) -> PathBuf {
    root.join(TERRAIN_DIR)
}

pub fn chunk_path(root: &Path, coord: GridCoord) -> PathBuf {
    terrain_dir(root).join(coord.to_string())
}

/// Chunk files of a save, sorted by coordinate. Files whose names are not
/// coordinates are skipped.
pub fn list_chunks(root: &Path) -> Result<Vec<(GridCoord, PathBuf)>> {
    let dir = terrain_dir(root);
    if !dir.is_dir() {
        return Err(Error::MissingSave(dir));
    }

    let mut chunks = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let parsed = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::parse::<GridCoord>);
        match parsed {
            Some(Ok(coord)) => chunks.push((coord, path)),
            _ => debug!("Ignoring {} in terrain save", path.display()),
        }
    }
    chunks.sort_by_key(|(coord, _)| *coord);
    Ok(chunks)
}

pub fn write_chunk(path: &Path, records: &[ModifyState]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        for record in records {
            encoder.write_all(&record.to_le_bytes())?;
        }
        encoder.finish()?.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Decodes one chunk file, checking it holds exactly `count` records.
pub fn read_chunk(path: &Path, coord: GridCoord, count: usize) -> Result<Vec<ModifyState>> {
    let corrupt = |reason: String| {
        Error::from(CorruptChunkError {
            coord,
            path: path.to_path_buf(),
            reason,
        })
    };

    let file = File::open(path)?;
    let mut bytes = Vec::with_capacity(count * ModifyState::BYTES);
    GzDecoder::new(BufReader::new(file))
        .read_to_end(&mut bytes)
        .map_err(|err| corrupt(format!("gzip stream unreadable: {}", err)))?;

    let expected = count * ModifyState::BYTES;
    if bytes.len() != expected {
        warn!(
            "Terrain chunk {} holds {} bytes, expected {}",
            coord,
            bytes.len(),
            expected
        );
        return Err(corrupt(format!(
            "expected {} bytes, found {}",
            expected,
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(ModifyState::BYTES)
        .map(|raw| {
            let mut record = [0u8; ModifyState::BYTES];
            record.copy_from_slice(raw);
            ModifyState::from_le_bytes(&record)
        })
        .collect())
}
