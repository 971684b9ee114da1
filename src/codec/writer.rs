//! Snapshot Writer
//!
//! Streams a collection to disk through a temporary sibling file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, StoreError};

use super::Document;

/// Per-record wrapper as it appears on disk
#[derive(Serialize)]
struct StoredRecordRef<'a> {
    document: &'a Document,
    indexes: NoIndexes,
}

/// Serializes as `{}`
#[derive(Serialize)]
struct NoIndexes {}

fn write_header<W: Write>(out: &mut W, last_id: u64) -> Result<()> {
    write!(out, "{{\"last_id\":{},\"records\":{{", last_id)?;
    Ok(())
}

fn write_record<W: Write>(out: &mut W, first: bool, id: u64, document: &Document) -> Result<()> {
    if !first {
        out.write_all(b",")?;
    }
    write!(out, "\n\"{}\":", id)?;
    serde_json::to_writer(
        &mut *out,
        &StoredRecordRef {
            document,
            indexes: NoIndexes {},
        },
    )?;
    Ok(())
}

fn write_trailer<W: Write>(out: &mut W) -> Result<()> {
    out.write_all(b"\n}}\n")?;
    Ok(())
}

/// Encode a whole collection into memory
///
/// Produces exactly the bytes `SnapshotWriter` puts on disk.
pub fn encode<'a, I>(last_id: u64, records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (u64, &'a Document)>,
{
    let mut out = Vec::new();
    write_header(&mut out, last_id)?;
    for (n, (id, document)) in records.into_iter().enumerate() {
        write_record(&mut out, n == 0, id, document)?;
    }
    write_trailer(&mut out)?;
    Ok(out)
}

/// Writes a collection file chunk by chunk
///
/// Everything goes to `{path}.tmp`; `finish()` syncs it and renames it over
/// `path`, so a crash part-way through leaves the previous file untouched.
pub struct SnapshotWriter {
    /// Final destination
    path: PathBuf,
    /// Temporary file being written
    tmp_path: PathBuf,
    /// Buffered writer for the temporary file
    writer: BufWriter<File>,
    /// Records written so far
    records_written: u64,
}

impl SnapshotWriter {
    /// Start a new snapshot of a collection whose highest id is `last_id`
    pub fn create(path: &Path, last_id: u64) -> Result<Self> {
        let tmp_path = Self::tmp_path_for(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);
        write_header(&mut writer, last_id)?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            records_written: 0,
        })
    }

    /// Append one record
    pub fn write_record(&mut self, id: u64, document: &Document) -> Result<()> {
        write_record(&mut self.writer, self.records_written == 0, id, document)?;
        self.records_written += 1;
        Ok(())
    }

    /// Push buffered bytes of the current chunk to the OS
    pub fn end_chunk(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Close the file, sync it, and atomically replace the destination
    ///
    /// Returns the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        write_trailer(&mut self.writer)?;
        self.writer.flush()?;

        let file = self.writer.into_inner().map_err(|e| {
            StoreError::Persistence(format!("Failed to flush snapshot: {}", e))
        })?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        Ok(self.records_written)
    }

    /// Temporary file used while writing `path`
    pub fn tmp_path_for(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all()?,
        _ => {}
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
