//! Record store adapter and run outputs.

pub mod csv_store;

pub use csv_store::RecordSet;

use crate::error::{EngineError, Result};
use crate::record::ClientRecord;
use log::info;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `path` through a temporary file in the same directory, renaming it
/// into place only once `write` has succeeded
pub(crate) fn persist_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| EngineError::io(dir, e))?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all().map_err(|e| EngineError::io(path, e))?;
    tmp.persist(path).map_err(|e| EngineError::io(path, e.error))?;
    Ok(())
}

/// Write every allocated address, one per line, in record order
pub fn write_address_list(path: &Path, records: &[ClientRecord]) -> Result<usize> {
    let addresses: Vec<&str> = records.iter().filter_map(|r| r.address.as_deref()).collect();

    persist_atomically(path, |file| {
        for address in &addresses {
            writeln!(file, "{}", address).map_err(|e| EngineError::io(path, e))?;
        }
        Ok(())
    })?;

    info!("Wrote {} address(es) to {:?}", addresses.len(), path);
    Ok(addresses.len())
}
