//! Append-only writer for single-section record files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{StoredRecord, validate_output_path, write_footer, write_preamble};
use crate::codec::{end_section, write_frame};
use crate::header::{Footer, Header};

const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Tracks the byte offset of everything written.
pub(crate) struct CountingWriter<W> {
    inner: W,
    position: u64,
}

impl<W> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Creates the output file behind a buffered, position-tracking writer.
pub(crate) fn create_output(path: &Path) -> Result<CountingWriter<BufWriter<File>>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(CountingWriter::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)))
}

/// Writes records to a new file.
///
/// The file stays unfinished (and unreadable) until [`RecordWriter::finish`] writes the
/// footer and trailer; dropping the writer without finishing leaves it that way.
pub struct RecordWriter<T: StoredRecord> {
    path: PathBuf,
    output: CountingWriter<BufWriter<File>>,
    codec: T::Codec,
    header: Header,
    records_written: u64,
}

impl<T: StoredRecord> RecordWriter<T> {
    pub fn create(path: &Path, header: &Header) -> Result<Self> {
        validate_output_path(path, T::KIND)?;
        let mut output = create_output(path)?;
        write_preamble(&mut output, T::KIND, header)
            .with_context(|| format!("Failed to write header of {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            output,
            codec: T::codec(header),
            header: header.clone(),
            records_written: 0,
        })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn write(&mut self, record: &T) -> Result<()> {
        write_frame(&self.codec, record, &mut self.output)
            .with_context(|| format!("Failed to write record to {}", self.path.display()))?;
        self.records_written += 1;
        Ok(())
    }

    /// Writes every record of a fallible stream, stopping at the first error.
    pub fn write_all<I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<T>>,
    {
        let before = self.records_written;
        for record in records {
            self.write(&record?)?;
        }
        Ok(self.records_written - before)
    }

    /// Ends the record section and writes footer and trailer.
    pub fn finish(mut self, footer: &Footer) -> Result<()> {
        end_section(&mut self.output)?;
        let position = self.output.position();
        write_footer(&mut self.output, position, 0, footer)
            .with_context(|| format!("Failed to write footer of {}", self.path.display()))?;
        self.output.flush().with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(())
    }
}
