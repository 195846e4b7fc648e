//! Ledger persistence
//!
//! Saves and loads ledger state as JSON in the data directory.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// File name of the ledger state inside the data directory
pub const LEDGER_FILE: &str = "ledger.json";

/// JSON file storage in a data directory
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create the data directory if needed
    pub fn new(data_dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Write to a temporary file, then rename over the old state
    pub fn save<T: Serialize>(&self, state: &T) -> Result<(), StorageError> {
        let temp_path = self.data_dir.join(format!("{LEDGER_FILE}.tmp"));
        let file = fs::File::create(&temp_path)?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, state)?;

        fs::rename(&temp_path, self.path())?;
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        let file = fs::File::open(self.path())?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
