//! CSV record store.
//!
//! The file is edited by hand between runs, so loading keeps the raw rows
//! next to the parsed records and saving writes back every cell the engine
//! did not fill exactly as it was read.

use super::persist_atomically;
use crate::error::{EngineError, Result};
use crate::record::{ClientRecord, Field};
use csv::{ReaderBuilder, StringRecord, Writer};
use log::{debug, info};
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RecordSet {
    /// Header row as read, followed by any known columns that were missing
    headers: Vec<String>,
    /// Column index of each known field
    columns: Vec<(Field, usize)>,
    /// Raw cells of every data row, padded to the header width
    rows: Vec<Vec<String>>,
    pub records: Vec<ClientRecord>,
}

fn store_error(path: &Path) -> impl Fn(csv::Error) -> EngineError + '_ {
    move |source| EngineError::Store {
        path: path.to_path_buf(),
        source,
    }
}

impl RecordSet {
    /// Load and parse a record store from a CSV file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| EngineError::io(path, e))?;
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);

        let header = reader.headers().map_err(store_error(path))?.clone();
        if header.iter().all(|cell| cell.trim().is_empty()) {
            return Err(EngineError::malformed(1, "record store has no header row"));
        }

        let mut headers: Vec<String> = header.iter().map(str::to_string).collect();
        let mut columns: Vec<(Field, usize)> = Vec::new();
        for (index, name) in headers.iter().enumerate() {
            if let Some(field) = Field::from_column(name) {
                if columns.iter().any(|(known, _)| *known == field) {
                    return Err(EngineError::malformed(
                        1,
                        format!("column '{}' appears more than once", field.column()),
                    ));
                }
                columns.push((field, index));
            }
        }
        for field in Field::ALL {
            if !columns.iter().any(|(known, _)| *known == field) {
                debug!("Store {:?} lacks column '{}', it will be appended", path, field.column());
                columns.push((field, headers.len()));
                headers.push(field.column().to_string());
            }
        }

        let mut rows = Vec::new();
        let mut records = Vec::new();
        let mut raw = StringRecord::new();
        while reader.read_record(&mut raw).map_err(store_error(path))? {
            let row = raw
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(records.len() + 2);

            if raw.len() > headers.len() {
                return Err(EngineError::malformed(
                    row,
                    format!("{} cells but only {} columns", raw.len(), headers.len()),
                ));
            }
            let mut cells: Vec<String> = raw.iter().map(str::to_string).collect();
            cells.resize(headers.len(), String::new());

            let mut record = ClientRecord::new(row);
            for (field, index) in &columns {
                record.set(*field, &cells[*index]);
            }
            rows.push(cells);
            records.push(record);
        }

        info!("Loaded {} record(s) from {:?}", records.len(), path);
        Ok(Self {
            headers,
            columns,
            rows,
            records,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows as they will be written, with engine-filled values merged into
    /// the original cells
    fn merged_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows
            .iter()
            .zip(&self.records)
            .map(move |(raw, record)| {
                let mut cells = raw.clone();
                for (field, index) in &self.columns {
                    if let Some(value) = record.get(*field) {
                        if cells[*index].trim() != value {
                            cells[*index] = value.to_string();
                        }
                    }
                }
                cells
            })
    }

    /// Write the store to `path`, replacing any existing file in one step
    pub fn save(&self, path: &Path) -> Result<()> {
        let wrap = store_error(path);
        persist_atomically(path, |file| {
            let mut writer = Writer::from_writer(file);
            writer.write_record(&self.headers).map_err(&wrap)?;
            for cells in self.merged_rows() {
                writer.write_record(&cells).map_err(&wrap)?;
            }
            writer.flush().map_err(|e| EngineError::io(path, e))
        })?;

        info!("Saved {} record(s) to {:?}", self.records.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_maps_known_columns() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "sites.csv",
            "Client_Name,Site_Label,notes,subnet\nAcme,Depot 1,call first,\nAcme, ,,10.0.0.0/27\n",
        );

        let set = RecordSet::load(&path).unwrap();
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.records[0].row, 2);
        assert_eq!(set.records[0].client_name.as_deref(), Some("Acme"));
        assert_eq!(set.records[0].site_label.as_deref(), Some("Depot 1"));
        assert_eq!(set.records[0].subnet, None);
        assert_eq!(set.records[1].row, 3);
        assert_eq!(set.records[1].site_label, None);
        assert_eq!(set.records[1].subnet.as_deref(), Some("10.0.0.0/27"));
    }

    #[test]
    fn test_save_preserves_unknown_columns_and_appends_missing() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "sites.csv",
            "notes,client_name,site_label\n\"has, comma\",Acme,Depot 1\n",
        );

        let mut set = RecordSet::load(&path).unwrap();
        set.records[0].peer_name = Some("DEPOT_1".to_string());
        let out = dir.path().join("out.csv");
        set.save(&out).unwrap();

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(&headers[..3], &["notes", "client_name", "site_label"]);
        assert_eq!(headers.len(), 3 + 6);

        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "has, comma");
        assert_eq!(&row[1], "Acme");
        let peer_index = headers.iter().position(|h| h == "peer_name").unwrap();
        assert_eq!(&row[peer_index], "DEPOT_1");
    }

    #[test]
    fn test_save_then_load_is_stable() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "sites.csv",
            "group,subnet,client_name,site_label,peer_name,address,public_key,private_key\n\
             GROUP1,10.0.0.0/27,Acme,Depot,DEPOT,10.0.0.1,pub,priv\n",
        );

        let set = RecordSet::load(&path).unwrap();
        set.save(&path).unwrap();
        let again = RecordSet::load(&path).unwrap();
        assert_eq!(again.records, set.records);
        assert_eq!(again.headers(), set.headers());
    }

    #[test]
    fn test_untouched_cells_written_verbatim() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "sites.csv", "client_name,notes\n Acme ,x\n");

        let set = RecordSet::load(&path).unwrap();
        set.save(&path).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], " Acme ");
        assert_eq!(&row[1], "x");
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "sites.csv", "client_name,site_label,notes\nAcme\n");

        let set = RecordSet::load(&path).unwrap();
        assert_eq!(set.records[0].client_name.as_deref(), Some("Acme"));
        assert_eq!(set.records[0].site_label, None);
        set.save(&path).unwrap();
    }

    #[test]
    fn test_overlong_row_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "sites.csv", "client_name\nAcme,extra\n");
        assert!(matches!(
            RecordSet::load(&path),
            Err(EngineError::MalformedRecord { row: 2, .. })
        ));
    }

    #[test]
    fn test_empty_store_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "sites.csv", "");
        assert!(matches!(
            RecordSet::load(&path),
            Err(EngineError::MalformedRecord { row: 1, .. })
        ));
    }

    #[test]
    fn test_duplicate_known_column_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "sites.csv", "subnet,Subnet\n,\n");
        assert!(matches!(
            RecordSet::load(&path),
            Err(EngineError::MalformedRecord { row: 1, .. })
        ));
    }

    #[test]
    fn test_missing_store_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            RecordSet::load(&dir.path().join("missing.csv")),
            Err(EngineError::Io { .. })
        ));
    }
}
