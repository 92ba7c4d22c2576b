//! Combined clone + alignment files.
//!
//! Layout of the body:
//!
//! 1. clone section, clones in id order;
//! 2. alignment section, alignments grouped by clone index with unassigned alignments
//!    (clone index `-1`) first and clones in ascending order;
//! 3. a [`CloneIndex`] at `index_offset` giving the offset and alignment count of every
//!    clone's run, so the alignments of one clone can be read without scanning the rest.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::reader::CountingReader;
use super::writer::{CountingWriter, create_output};
use super::{FileKind, read_layout, validate_output_path, write_footer, write_preamble};
use crate::codec::{
    AlignmentCodec, CloneCodec, FrameReader, decode_value, encode_value, end_section, write_frame,
};
use crate::errors::{ClonekitError, ConsistencyError};
use crate::header::{Footer, Header};
use crate::model::{AlignmentRecord, CloneRecord, CloneSet, UNASSIGNED_CLONE};
use crate::sort::ExternalSorter;

/// Offset and length of one clone's alignment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: u64,
    pub count: u64,
}

/// Per-clone alignment index stored after the alignment section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneIndex {
    pub alignments_offset: u64,
    pub unassigned: Span,
    pub clones: Vec<Span>,
}

impl CloneIndex {
    #[must_use]
    pub fn span(&self, clone_index: i64) -> Option<Span> {
        if clone_index == UNASSIGNED_CLONE {
            Some(self.unassigned)
        } else {
            usize::try_from(clone_index).ok().and_then(|i| self.clones.get(i).copied())
        }
    }

    #[must_use]
    pub fn total_alignments(&self) -> u64 {
        self.unassigned.count + self.clones.iter().map(|s| s.count).sum::<u64>()
    }
}

/// Buffered input positioned inside a combined file.
pub type BufferedInput = CountingReader<BufReader<File>>;

/// Reader for combined files; every accessor opens an independent handle.
pub struct ClnaReader {
    path: PathBuf,
    header: Header,
    footer: Footer,
    body_start: u64,
    index: CloneIndex,
    clone_count: u64,
}

impl ClnaReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let layout = read_layout(&mut file, path, FileKind::ClonesAndAlignments)?;
        file.seek(SeekFrom::Start(layout.index_offset))?;
        let index: CloneIndex = decode_value(&mut BufReader::new(file))
            .with_context(|| format!("Failed to read clone index of {}", path.display()))?;
        let clone_count = index.clones.len() as u64;
        Ok(Self {
            path: path.to_path_buf(),
            header: layout.header,
            footer: layout.footer,
            body_start: layout.body_start,
            index,
            clone_count,
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

    #[must_use]
    pub fn number_of_clones(&self) -> u64 {
        self.clone_count
    }

    #[must_use]
    pub fn number_of_alignments(&self) -> u64 {
        self.index.total_alignments()
    }

    #[must_use]
    pub fn index(&self) -> &CloneIndex {
        &self.index
    }

    fn open_at(&self, offset: u64) -> Result<BufferedInput> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(CountingReader::new(BufReader::new(file), offset))
    }

    /// Streams the clones in id order.
    pub fn clones(&self) -> Result<FrameReader<BufferedInput, CloneRecord, CloneCodec>> {
        let input = self.open_at(self.body_start)?;
        Ok(FrameReader::new(input, CloneCodec::new(self.header.genes.shared())))
    }

    /// Reads all clones as a clone set.
    pub fn read_clone_set(&self) -> Result<CloneSet> {
        let clones = self.clones()?.collect::<Result<Vec<_>>>()?;
        Ok(CloneSet::new(clones))
    }

    /// Streams every alignment, unassigned first then clone by clone.
    pub fn alignments(
        &self,
    ) -> Result<FrameReader<BufferedInput, AlignmentRecord, AlignmentCodec>> {
        let input = self.open_at(self.index.alignments_offset)?;
        Ok(FrameReader::new(input, AlignmentCodec::new(self.header.genes.shared())))
    }

    /// Streams the alignments owned by one clone (or the unassigned ones for `-1`).
    pub fn alignments_of_clone(
        &self,
        clone_index: i64,
    ) -> Result<FrameReader<BufferedInput, AlignmentRecord, AlignmentCodec>> {
        let span = self.index.span(clone_index).ok_or_else(|| ClonekitError::IdNotFound {
            id: u64::try_from(clone_index).unwrap_or(u64::MAX),
            path: self.path.display().to_string(),
            available: self.clone_count,
        })?;
        let input = self.open_at(span.offset)?;
        Ok(FrameReader::with_limit(
            input,
            AlignmentCodec::new(self.header.genes.shared()),
            span.count,
        ))
    }
}

/// Writer for combined files.
///
/// Call order: [`ClnaWriter::write_clones`], then one of
/// [`ClnaWriter::write_grouped_alignments`] or [`ClnaWriter::collate_alignments`], then
/// [`ClnaWriter::finish`].
pub struct ClnaWriter {
    path: PathBuf,
    output: CountingWriter<std::io::BufWriter<File>>,
    header: Header,
    clone_count: Option<usize>,
    index: Option<CloneIndex>,
}

impl ClnaWriter {
    pub fn create(path: &Path, header: &Header) -> Result<Self> {
        validate_output_path(path, FileKind::ClonesAndAlignments)?;
        let mut output = create_output(path)?;
        write_preamble(&mut output, FileKind::ClonesAndAlignments, header)
            .with_context(|| format!("Failed to write header of {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            output,
            header: header.clone(),
            clone_count: None,
            index: None,
        })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn write_clones(&mut self, clones: &CloneSet) -> Result<()> {
        let codec = CloneCodec::new(self.header.genes.shared());
        for clone in clones.clones() {
            write_frame(&codec, clone, &mut self.output)
                .with_context(|| format!("Failed to write clone to {}", self.path.display()))?;
        }
        end_section(&mut self.output)?;
        self.clone_count = Some(clones.len());
        Ok(())
    }

    fn expect_clones(&self) -> Result<usize> {
        self.clone_count.ok_or_else(|| {
            ClonekitError::InvalidParameter {
                parameter: "clones".to_string(),
                reason: "clones must be written before alignments".to_string(),
            }
            .into()
        })
    }

    /// Writes alignments that are already ordered by clone index (unassigned first).
    ///
    /// Fails with a consistency error if the order is broken or an alignment references a
    /// clone that was not written.
    pub fn write_grouped_alignments<I>(&mut self, alignments: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<AlignmentRecord>>,
    {
        let clone_count = self.expect_clones()?;
        let codec = AlignmentCodec::new(self.header.genes.shared());
        let alignments_offset = self.output.position();
        let mut index = CloneIndex {
            alignments_offset,
            unassigned: Span { offset: alignments_offset, count: 0 },
            clones: vec![Span::default(); clone_count],
        };

        let mut current = UNASSIGNED_CLONE;
        let mut written = 0u64;
        for alignment in alignments {
            let alignment = alignment?;
            let clone_index = alignment.clone_index;
            if clone_index < current {
                return Err(ClonekitError::from(ConsistencyError::StreamNotSorted {
                    stream: "clone-grouped alignment".to_string(),
                    previous: current.to_string(),
                    current: clone_index.to_string(),
                })
                .into());
            }
            let position = self.output.position();
            let span = if clone_index == UNASSIGNED_CLONE {
                &mut index.unassigned
            } else {
                usize::try_from(clone_index)
                    .ok()
                    .and_then(|i| index.clones.get_mut(i))
                    .ok_or_else(|| {
                        ClonekitError::from(ConsistencyError::CloneReferenceMismatch {
                            alignment_index: alignment.alignment_index,
                            clone_index,
                            reason: format!("only {clone_count} clones were written"),
                        })
                    })?
            };
            if span.count == 0 {
                span.offset = position;
            }
            span.count += 1;
            current = clone_index;

            write_frame(&codec, &alignment, &mut self.output).with_context(|| {
                format!("Failed to write alignment to {}", self.path.display())
            })?;
            written += 1;
        }
        end_section(&mut self.output)?;
        self.index = Some(index);
        Ok(written)
    }

    /// Sorts alignments by (clone index, alignment index) with the external sorter and
    /// writes them grouped.
    pub fn collate_alignments<I>(&mut self, alignments: I, sorter: &ExternalSorter) -> Result<u64>
    where
        I: IntoIterator<Item = Result<AlignmentRecord>>,
    {
        let codec = AlignmentCodec::new(self.header.genes.shared());
        let sorted = sorter.sort_by_key(alignments, codec, |a: &AlignmentRecord| {
            (a.clone_index, a.alignment_index)
        })?;
        self.write_grouped_alignments(sorted)
    }

    /// Writes the clone index, footer and trailer.
    pub fn finish(mut self, footer: &Footer) -> Result<()> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                // A file without alignments still needs both sections.
                self.write_grouped_alignments(std::iter::empty())?;
                self.index.take().unwrap_or_default()
            }
        };
        let index_offset = self.output.position();
        encode_value(&index, &mut self.output)?;
        let footer_offset = self.output.position();
        write_footer(&mut self.output, footer_offset, index_offset, footer)
            .with_context(|| format!("Failed to write footer of {}", self.path.display()))?;
        self.output.flush().with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(())
    }
}
