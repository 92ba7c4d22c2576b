//! Streaming reader for single-section record files.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{StoredRecord, read_layout};
use crate::codec::FrameReader;
use crate::header::{Footer, Header};
use crate::progress::ReportsProgress;

/// Buffer size for record file input.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Counts the bytes pulled through a reader, starting from the offset it was opened at.
pub struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, position: u64) -> Self {
        Self { inner, position }
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// Lazily pulls records from a finished file.
///
/// Opening validates the magic and the trailer, so a reader only ever exists for finished
/// files. Records are yielded as `Result`s; the first error ends the stream.
pub struct RecordReader<T: StoredRecord> {
    path: PathBuf,
    header: Header,
    footer: Footer,
    records: FrameReader<CountingReader<BufReader<File>>, T, T::Codec>,
    body_start: u64,
    body_end: u64,
    records_read: u64,
}

impl<T: StoredRecord> RecordReader<T> {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let layout = read_layout(&mut file, path, T::KIND)?;
        file.seek(SeekFrom::Start(layout.body_start))?;
        let input = CountingReader::new(
            BufReader::with_capacity(READ_BUFFER_SIZE, file),
            layout.body_start,
        );
        let codec = T::codec(&layout.header);
        Ok(Self {
            path: path.to_path_buf(),
            records: FrameReader::new(input, codec),
            body_start: layout.body_start,
            body_end: layout.footer_offset,
            header: layout.header,
            footer: layout.footer,
            records_read: 0,
        })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of reads the producing pipeline processed, as declared by the footer.
    #[must_use]
    pub fn processed_reads(&self) -> u64 {
        self.footer.processed_reads
    }

    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Reads all remaining records into memory.
    pub fn read_all(self) -> Result<Vec<T>> {
        let path = self.path.clone();
        self.collect::<Result<Vec<T>>>()
            .with_context(|| format!("Failed to read records from {}", path.display()))
    }
}

impl<T: StoredRecord> Iterator for RecordReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.records.next();
        if let Some(Ok(_)) = item {
            self.records_read += 1;
        }
        item
    }
}

impl<T: StoredRecord> ReportsProgress for RecordReader<T> {
    #[allow(clippy::cast_precision_loss)]
    fn progress(&self) -> f64 {
        let span = self.body_end.saturating_sub(self.body_start);
        if span == 0 {
            return 1.0;
        }
        let consumed = self.records.get_ref().position().saturating_sub(self.body_start);
        (consumed as f64 / span as f64).min(1.0)
    }
}
