use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;
use crate::record::{COLUMNS, Record, RecordSet};

/// Flat CSV file holding every record.
///
/// Each operation reads the whole file and each mutation rewrites it, so the
/// file is the only state. There is no locking: two handles appending to the
/// same path at the same time can lose one of the updates (last writer wins).
/// Callers sharing a handle across threads wrap it in a mutex.
#[derive(Clone, Debug)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RecordStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record from the backing file.
    ///
    /// A missing file yields an empty set; every other failure is returned.
    pub fn load(&self) -> Result<RecordSet> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No backing file at {}, starting empty", self.path.display());
                return Ok(RecordSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        let records = parse_csv(file)?;
        debug!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Appends one record after the existing ones and rewrites the file.
    pub fn append(&self, record: Record) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        self.persist(&records)?;
        info!(
            "Appended record to {} ({} total)",
            self.path.display(),
            records.len()
        );
        Ok(())
    }

    /// Overwrites the file with `records`.
    pub fn replace(&self, records: &RecordSet) -> Result<()> {
        self.persist(records)?;
        info!(
            "Replaced {} with {} records",
            self.path.display(),
            records.len()
        );
        Ok(())
    }

    fn persist(&self, records: &RecordSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&self.path)?;
        write_csv(io::BufWriter::new(file), records)
    }
}

/// Parses CSV text with a `Date,Task,Duration` header into records.
///
/// Columns are matched by header name. Rows with a wrong number of fields or a
/// missing column are errors.
pub fn parse_csv<R: Read>(reader: R) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut records = RecordSet::new();
    for row in reader.deserialize::<Record>() {
        records.push(row?);
    }

    Ok(records)
}

/// Writes records as CSV. The header row is always written, even for an
/// empty set.
pub fn write_csv<W: Write>(writer: W, records: &RecordSet) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(COLUMNS)?;
    for record in records {
        writer.write_record([&record.date, &record.task, &record.duration])?;
    }
    writer.flush()?;

    Ok(())
}

/// Renders records as CSV bytes, for downloads.
pub fn to_csv_bytes(records: &RecordSet) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records)?;
    Ok(buffer)
}
