#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{Account, Position};

/// Plain records of the engine state, handed to and received from the persistence layer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Account ledger.
    pub account: Account,
    /// Open and closed positions; closed ones carry a close time.
    pub positions: Vec<Position>,
}

#[cfg(feature = "serde")]
impl Snapshot {
    /// Serializes the snapshot to JSON.
    pub fn to_json(&self) -> crate::errors::Result<String> {
        serde_json::to_string(self).map_err(crate::errors::Error::from)
    }

    /// Deserializes a snapshot from JSON.
    pub fn from_json(json: &str) -> crate::errors::Result<Self> {
        serde_json::from_str(json).map_err(crate::errors::Error::from)
    }

    /// Writes the snapshot as JSON to `filepath`.
    pub fn save(&self, filepath: impl AsRef<std::path::Path>) -> crate::errors::Result<()> {
        use std::{fs::File, io::BufWriter};

        let file = File::create(filepath)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a snapshot from the JSON file at `filepath`.
    pub fn load(filepath: impl AsRef<std::path::Path>) -> crate::errors::Result<Self> {
        use std::{fs::File, io::BufReader};

        let file = File::open(filepath)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(crate::errors::Error::from)
    }
}
