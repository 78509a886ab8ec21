//! Binary persistence of a [QTable].
//!
//! The stream is a MessagePack encoded record holding a format tag, a version, the three
//! dimension sizes `[resolution, resolution, action space]` and the dense value array.
//! `f64` values survive a round-trip bit-for-bit.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::q_table::QTable;
use crate::prelude::{Action, QlError};

pub const FORMAT_TAG: &str = "ql-dense-q-table";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SavedQTable {
    format: String,
    version: u32,
    dims: [u32; 3],
    values: Vec<f64>,
}

impl SavedQTable {
    fn from_table<A: Action>(table: &QTable<A>) -> Self {
        let resolution = table.resolution() as u32;
        Self {
            format: FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
            dims: [resolution, resolution, A::ACTION_SPACE as u32],
            values: table.values().to_vec(),
        }
    }

    fn into_table<A: Action>(self) -> Result<QTable<A>, QlError> {
        if self.format != FORMAT_TAG {
            return Err(QlError::Format(format!("unknown format tag '{}', expected '{}'", self.format, FORMAT_TAG)));
        }
        if self.version != FORMAT_VERSION {
            return Err(QlError::Format(format!(
                "unsupported version {}, expected {}",
                self.version, FORMAT_VERSION
            )));
        }

        let [horizontal, vertical, actions] = self.dims;
        if horizontal == 0 || horizontal != vertical {
            return Err(QlError::Format(format!(
                "state dimensions must be equal and positive, got {}x{}",
                horizontal, vertical
            )));
        }
        if actions != A::ACTION_SPACE as u32 {
            return Err(QlError::Format(format!(
                "action dimension {} does not match the action space {}",
                actions,
                A::ACTION_SPACE
            )));
        }

        let resolution = horizontal as usize;
        let expected_len = resolution
            .checked_mul(resolution)
            .and_then(|n| n.checked_mul(actions as usize))
            .ok_or_else(|| QlError::Format(format!("shape {:?} overflows the addressable size", self.dims)))?;
        if self.values.len() != expected_len {
            return Err(QlError::Format(format!(
                "expected {} values for shape {:?}, got {}",
                expected_len,
                self.dims,
                self.values.len()
            )));
        }

        Ok(QTable::from_values(resolution, self.values))
    }
}

pub fn save<A: Action, W: Write>(
    table: &QTable<A>,
    writer: &mut W,
) -> Result<(), QlError> {
    rmp_serde::encode::write_named(writer, &SavedQTable::from_table(table))
        .map_err(|e| QlError::Format(format!("failed to encode q-table: {}", e)))
}

/// Reads a table; shape or version mismatches fail as a whole - there is no partial load.
pub fn load<A: Action, R: Read>(reader: R) -> Result<QTable<A>, QlError> {
    let saved: SavedQTable =
        rmp_serde::decode::from_read(reader).map_err(|e| QlError::Format(format!("failed to decode q-table: {}", e)))?;
    saved.into_table()
}

pub fn to_bytes<A: Action>(table: &QTable<A>) -> Result<Vec<u8>, QlError> {
    let mut bytes = vec![];
    save(table, &mut bytes)?;
    Ok(bytes)
}

pub fn from_bytes<A: Action>(bytes: &[u8]) -> Result<QTable<A>, QlError> { load(bytes) }

pub fn save_to_file<A: Action>(
    table: &QTable<A>,
    path: &Path,
) -> Result<(), QlError> {
    let file = File::create(path).map_err(|source| QlError::Io {
        operation: format!("create file {}", path.display()),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    save(table, &mut writer)?;
    writer.flush().map_err(|source| QlError::Io {
        operation: format!("write file {}", path.display()),
        source,
    })?;
    log::debug!("saved q-table ({}x{}x{}) to {}", table.resolution(), table.resolution(), A::ACTION_SPACE, path.display());
    Ok(())
}

pub fn load_from_file<A: Action>(path: &Path) -> Result<QTable<A>, QlError> {
    let file = File::open(path).map_err(|source| QlError::Io {
        operation: format!("open file {}", path.display()),
        source,
    })?;
    let table = load(BufReader::new(file))?;
    log::debug!("loaded q-table ({}x{}x{}) from {}", table.resolution(), table.resolution(), A::ACTION_SPACE, path.display());
    Ok(table)
}
