//! External merge-sort over record streams.
//!
//! Handles streams larger than available RAM by spilling sorted chunks to temporary files.
//!
//! # Algorithm
//!
//! 1. **Accumulate phase**: pull records into memory until the record or memory limit is hit
//! 2. **Sort phase**: stable sort of the chunk (parallel with rayon when `threads > 1`)
//! 3. **Spill phase**: write the chunk with the caller's codec, optionally gzip-compressed
//! 4. **Merge phase**: k-way merge of the chunk heads driven by the comparator
//!
//! Nothing touches the disk when the whole input fits in one chunk. Chunks live in a
//! [`TempDir`] owned by the returned [`SortedStream`]; the directory is removed as soon as the
//! stream is exhausted or dropped.
//!
//! Equal records keep their input order (the chunk sort is stable and merge ties go to the
//! earlier chunk), so sorting an already sorted stream reproduces it exactly.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use log::{debug, info};
use rayon::prelude::*;
use tempfile::TempDir;

use super::EstimatedSize;
use crate::codec::{FrameReader, RecordCodec, end_section, write_frame};
use crate::progress::ReportsProgress;

/// Default memory limit per chunk (512 MB).
const DEFAULT_MEMORY_LIMIT: usize = 512 * 1024 * 1024;

/// Default maximum number of records per chunk.
const DEFAULT_MAX_RECORDS: usize = 1_000_000;

/// Buffer size for reading chunk files during merge.
const MERGE_BUFFER_SIZE: usize = 64 * 1024;

/// Spill-and-merge sorter configuration.
#[derive(Debug, Clone)]
pub struct ExternalSorter {
    /// Maximum records held in memory before spilling.
    max_records: usize,
    /// Maximum estimated bytes held in memory before spilling.
    memory_limit: usize,
    /// Parent directory for the temporary chunk directory.
    temp_dir: Option<PathBuf>,
    /// Threads used for the in-memory sort.
    threads: usize,
    /// Gzip level for chunk files; `None` writes them uncompressed.
    temp_compression: Option<u32>,
}

impl Default for ExternalSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalSorter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            temp_dir: None,
            threads: 1,
            temp_compression: None,
        }
    }

    #[must_use]
    pub fn max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.max(1);
        self
    }

    #[must_use]
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn temp_compression(mut self, level: Option<u32>) -> Self {
        self.temp_compression = level;
        self
    }

    /// Sorts by an extracted key.
    pub fn sort_by_key<T, C, I, K, F>(
        &self,
        records: I,
        codec: C,
        key: F,
    ) -> Result<SortedStream<T, C, impl Fn(&T, &T) -> Ordering + Sync + use<T, C, I, K, F>>>
    where
        T: EstimatedSize + Send,
        C: RecordCodec<T>,
        I: IntoIterator<Item = Result<T>>,
        K: Ord,
        F: Fn(&T) -> K + Sync,
    {
        self.sort_by(records, codec, move |a: &T, b: &T| key(a).cmp(&key(b)))
    }

    /// Sorts by a comparator.
    pub fn sort_by<T, C, I, F>(&self, records: I, codec: C, compare: F) -> Result<SortedStream<T, C, F>>
    where
        T: EstimatedSize + Send,
        C: RecordCodec<T>,
        I: IntoIterator<Item = Result<T>>,
        F: Fn(&T, &T) -> Ordering + Sync,
    {
        let mut stats = SortStats::default();
        let mut temp_dir: Option<TempDir> = None;
        let mut chunk_files: Vec<PathBuf> = Vec::new();
        let mut chunk: Vec<T> = Vec::new();
        let mut memory_used = 0usize;

        for record in records {
            let record = record?;
            stats.total_records += 1;
            memory_used += record.estimated_size();
            chunk.push(record);

            if chunk.len() >= self.max_records || memory_used >= self.memory_limit {
                if temp_dir.is_none() {
                    temp_dir = Some(self.create_temp_dir()?);
                }
                let path = match temp_dir.as_ref() {
                    Some(dir) => dir.path().join(format!("chunk_{:04}", chunk_files.len())),
                    None => continue,
                };
                self.sort_chunk(&mut chunk, &compare);
                self.write_chunk(&chunk, &codec, &path)?;
                debug!("Spilled {} records to {}", chunk.len(), path.display());
                stats.chunks_written += 1;
                chunk_files.push(path);
                chunk.clear();
                memory_used = 0;
            }
        }

        self.sort_chunk(&mut chunk, &compare);

        let Some(temp_dir) = temp_dir else {
            return Ok(SortedStream {
                total: stats.total_records,
                emitted: 0,
                stats,
                inner: Inner::InMemory(chunk.into_iter()),
            });
        };

        info!(
            "Merging {} spilled chunks and {} in-memory records",
            chunk_files.len(),
            chunk.len()
        );
        let mut sources: Vec<ChunkSource<T, C>> = chunk_files
            .iter()
            .map(|path| self.open_chunk(path, codec.clone()))
            .collect::<Result<_>>()?;
        sources.push(ChunkSource::Memory(chunk.into_iter()));

        let mut heads = Vec::with_capacity(sources.len());
        for source in &mut sources {
            heads.push(source.next().transpose()?);
        }

        Ok(SortedStream {
            total: stats.total_records,
            emitted: 0,
            stats,
            inner: Inner::Merging(Merger { temp_dir: Some(temp_dir), sources, heads, compare }),
        })
    }

    fn sort_chunk<T: Send, F: Fn(&T, &T) -> Ordering + Sync>(&self, chunk: &mut [T], compare: &F) {
        if self.threads > 1 {
            chunk.par_sort_by(|a, b| compare(a, b));
        } else {
            chunk.sort_by(|a, b| compare(a, b));
        }
    }

    fn write_chunk<T, C: RecordCodec<T>>(&self, chunk: &[T], codec: &C, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create chunk file {}", path.display()))?;
        let write_section = |out: &mut dyn Write| -> Result<()> {
            for record in chunk {
                write_frame(codec, record, out)?;
            }
            end_section(out)
        };
        let mut out = match self.temp_compression {
            Some(level) => {
                let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::new(level));
                write_section(&mut encoder)?;
                encoder.finish()?
            }
            None => {
                let mut out = BufWriter::new(file);
                write_section(&mut out)?;
                out
            }
        };
        out.flush().with_context(|| format!("Failed to flush chunk file {}", path.display()))?;
        Ok(())
    }

    fn open_chunk<T, C: RecordCodec<T>>(&self, path: &Path, codec: C) -> Result<ChunkSource<T, C>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open chunk file {}", path.display()))?;
        let input: Box<dyn Read + Send> = match self.temp_compression {
            Some(_) => Box::new(MultiGzDecoder::new(BufReader::with_capacity(MERGE_BUFFER_SIZE, file))),
            None => Box::new(BufReader::with_capacity(MERGE_BUFFER_SIZE, file)),
        };
        Ok(ChunkSource::File(FrameReader::new(input, codec)))
    }

    fn create_temp_dir(&self) -> Result<TempDir> {
        match &self.temp_dir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                TempDir::new_in(base).context("Failed to create temp directory")
            }
            None => TempDir::new().context("Failed to create temp directory"),
        }
    }
}

/// Statistics from a sort operation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    /// Total records read from input.
    pub total_records: u64,
    /// Number of temporary chunk files written.
    pub chunks_written: usize,
}

enum ChunkSource<T, C> {
    File(FrameReader<Box<dyn Read + Send>, T, C>),
    Memory(std::vec::IntoIter<T>),
}

impl<T, C: RecordCodec<T>> Iterator for ChunkSource<T, C> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        match self {
            ChunkSource::File(reader) => reader.next(),
            ChunkSource::Memory(iter) => iter.next().map(Ok),
        }
    }
}

struct Merger<T, C, F> {
    temp_dir: Option<TempDir>,
    sources: Vec<ChunkSource<T, C>>,
    heads: Vec<Option<T>>,
    compare: F,
}

impl<T, C: RecordCodec<T>, F: Fn(&T, &T) -> Ordering> Merger<T, C, F> {
    /// Pops the smallest head; ties go to the lowest chunk index.
    fn pop(&mut self) -> Option<Result<T>> {
        let mut best: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            let Some(candidate) = head else { continue };
            best = match best {
                Some(b) => match self.heads[b].as_ref() {
                    Some(current) if (self.compare)(candidate, current) == Ordering::Less => Some(i),
                    _ => Some(b),
                },
                None => Some(i),
            };
        }

        let Some(index) = best else {
            // Exhausted: release chunk files now rather than on drop.
            self.sources.clear();
            self.temp_dir = None;
            return None;
        };

        let record = self.heads[index].take();
        match self.sources[index].next().transpose() {
            Ok(next) => self.heads[index] = next,
            Err(e) => return Some(Err(e)),
        }
        record.map(Ok)
    }
}

enum Inner<T, C, F> {
    InMemory(std::vec::IntoIter<T>),
    Merging(Merger<T, C, F>),
}

/// Sorted output of [`ExternalSorter`].
pub struct SortedStream<T, C, F> {
    inner: Inner<T, C, F>,
    stats: SortStats,
    total: u64,
    emitted: u64,
}

impl<T, C, F> SortedStream<T, C, F> {
    #[must_use]
    pub fn stats(&self) -> SortStats {
        self.stats
    }

    /// Location of the spilled chunks, if any were written and the stream is not exhausted.
    #[must_use]
    pub fn temp_path(&self) -> Option<&Path> {
        match &self.inner {
            Inner::Merging(m) => m.temp_dir.as_ref().map(TempDir::path),
            Inner::InMemory(_) => None,
        }
    }
}

impl<T, C: RecordCodec<T>, F: Fn(&T, &T) -> Ordering> Iterator for SortedStream<T, C, F> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        let item = match &mut self.inner {
            Inner::InMemory(iter) => iter.next().map(Ok),
            Inner::Merging(merger) => merger.pop(),
        };
        if let Some(Ok(_)) = item {
            self.emitted += 1;
        }
        item
    }
}

impl<T, C, F> ReportsProgress for SortedStream<T, C, F> {
    #[allow(clippy::cast_precision_loss)]
    fn progress(&self) -> f64 {
        if self.total == 0 { 1.0 } else { self.emitted as f64 / self.total as f64 }
    }
}
