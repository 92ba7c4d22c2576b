//! Record serialization.
//!
//! Records are stored with `bincode` (standard configuration, fixed-width integers). Gene
//! hits are stored as indices into the file's [`GeneCatalog`], so alignment and clone codecs
//! carry the catalog as side information. The external sorter takes a codec for the same
//! reason instead of assuming records can be serialized on their own.
//!
//! Record sections are framed: every record is preceded by [`FRAME_RECORD`], and a section
//! ends with [`FRAME_END`].

use std::io::{Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bincode::error::DecodeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ClonekitError;
use crate::model::{AlignmentRecord, CloneRecord, GeneCatalog, GeneHits, TagCount, TagTuple};

/// Marker byte preceding every record of a section.
pub const FRAME_RECORD: u8 = 0x01;
/// Marker byte terminating a section.
pub const FRAME_END: u8 = 0x00;

/// Upper bound on the encoded size of one value (a header, a footer or a record).
///
/// Decoding checks every length prefix against it before allocating, so a corrupted length
/// fails as [`ClonekitError::MalformedRecord`] instead of exhausting memory.
pub const MAX_ENCODED_VALUE_LEN: usize = 256 * 1024 * 1024;

pub(crate) fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding().with_limit::<MAX_ENCODED_VALUE_LEN>()
}

/// Encodes a serde value with the file configuration.
pub fn encode_value<T: Serialize + ?Sized>(value: &T, out: &mut dyn Write) -> Result<()> {
    let bytes =
        bincode::serde::encode_to_vec(value, bincode_config()).context("Failed to encode value")?;
    if bytes.len() > MAX_ENCODED_VALUE_LEN {
        return Err(ClonekitError::InvalidParameter {
            parameter: "record".to_string(),
            reason: format!(
                "encoded size {} exceeds the maximum of {MAX_ENCODED_VALUE_LEN} bytes",
                bytes.len()
            ),
        }
        .into());
    }
    out.write_all(&bytes).context("Failed to write encoded value")?;
    Ok(())
}

/// Decodes a serde value with the file configuration.
///
/// I/O failures (including a truncated input) keep their I/O error; anything else bincode
/// rejects is malformed data.
pub fn decode_value<T: DeserializeOwned>(mut input: &mut dyn Read) -> Result<T> {
    match bincode::serde::decode_from_std_read(&mut input, bincode_config()) {
        Ok(value) => Ok(value),
        Err(e @ DecodeError::Io { .. }) => {
            Err(anyhow::Error::new(e).context("Failed to decode value"))
        }
        Err(DecodeError::LimitExceeded) => Err(ClonekitError::MalformedRecord {
            reason: format!("a length prefix exceeds the maximum of {MAX_ENCODED_VALUE_LEN} bytes"),
        }
        .into()),
        Err(e) => Err(ClonekitError::MalformedRecord { reason: e.to_string() }.into()),
    }
}

/// Encodes and decodes one record type.
pub trait RecordCodec<T>: Clone + Send + Sync {
    fn encode(&self, record: &T, out: &mut dyn Write) -> Result<()>;

    fn decode(&self, input: &mut dyn Read) -> Result<T>;
}

/// Writes one framed record.
pub fn write_frame<T, C: RecordCodec<T>>(codec: &C, record: &T, out: &mut dyn Write) -> Result<()> {
    out.write_all(&[FRAME_RECORD]).context("Failed to write record frame")?;
    codec.encode(record, out)
}

/// Terminates a section.
pub fn end_section(out: &mut dyn Write) -> Result<()> {
    out.write_all(&[FRAME_END]).context("Failed to write section end")?;
    Ok(())
}

/// Reads one framed record; `None` at the end of the section.
pub fn read_frame<T, C: RecordCodec<T>>(codec: &C, input: &mut dyn Read) -> Result<Option<T>> {
    let mut marker = [0u8; 1];
    input.read_exact(&mut marker).context("Failed to read record frame (truncated section?)")?;
    match marker[0] {
        FRAME_RECORD => codec.decode(input).map(Some),
        FRAME_END => Ok(None),
        other => bail!("Corrupt record section: unexpected frame marker 0x{other:02x}"),
    }
}

/// Iterator over the framed records of one section.
pub struct FrameReader<R, T, C> {
    input: R,
    codec: C,
    remaining: Option<u64>,
    done: bool,
    _record: PhantomData<fn() -> T>,
}

impl<R: Read, T, C: RecordCodec<T>> FrameReader<R, T, C> {
    /// Reads until the section end marker.
    pub fn new(input: R, codec: C) -> Self {
        Self { input, codec, remaining: None, done: false, _record: PhantomData }
    }

    /// Reads at most `count` records without requiring an end marker after them.
    pub fn with_limit(input: R, codec: C, count: u64) -> Self {
        Self { input, codec, remaining: Some(count), done: count == 0, _record: PhantomData }
    }

    pub fn get_ref(&self) -> &R {
        &self.input
    }
}

impl<R: Read, T, C: RecordCodec<T>> Iterator for FrameReader<R, T, C> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = read_frame(&self.codec, &mut self.input);
        match result {
            Ok(Some(record)) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                    self.done = *remaining == 0;
                }
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Codec for any self-contained serde type.
pub struct BincodeCodec<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { _record: PhantomData }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> RecordCodec<T> for BincodeCodec<T> {
    fn encode(&self, record: &T, out: &mut dyn Write) -> Result<()> {
        encode_value(record, out)
    }

    fn decode(&self, input: &mut dyn Read) -> Result<T> {
        decode_value(input)
    }
}

#[derive(Serialize, Deserialize)]
struct AlignmentWire {
    read_ids: Vec<u64>,
    hits: [Vec<(u32, f32)>; 4],
    targets: Vec<String>,
    junction: Option<String>,
    clone_index: i64,
    tags: TagTuple,
    alignment_index: u64,
}

/// Alignment codec resolving hits through a gene catalog.
#[derive(Clone)]
pub struct AlignmentCodec {
    genes: Arc<GeneCatalog>,
}

impl AlignmentCodec {
    #[must_use]
    pub fn new(genes: Arc<GeneCatalog>) -> Self {
        Self { genes }
    }
}

impl RecordCodec<AlignmentRecord> for AlignmentCodec {
    fn encode(&self, record: &AlignmentRecord, out: &mut dyn Write) -> Result<()> {
        let wire = AlignmentWire {
            read_ids: record.read_ids.clone(),
            hits: record.hits.to_indices(&self.genes)?,
            targets: record.targets.clone(),
            junction: record.junction.clone(),
            clone_index: record.clone_index,
            tags: record.tags.clone(),
            alignment_index: record.alignment_index,
        };
        encode_value(&wire, out)
    }

    fn decode(&self, input: &mut dyn Read) -> Result<AlignmentRecord> {
        let wire: AlignmentWire = decode_value(input)?;
        Ok(AlignmentRecord {
            read_ids: wire.read_ids,
            hits: GeneHits::from_indices(wire.hits, &self.genes)?,
            targets: wire.targets,
            junction: wire.junction,
            clone_index: wire.clone_index,
            tags: wire.tags,
            alignment_index: wire.alignment_index,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct CloneWire {
    id: u64,
    count: f64,
    fraction: f64,
    targets: Vec<String>,
    junction: Option<String>,
    hits: [Vec<(u32, f32)>; 4],
    tag_count: TagCount,
}

/// Clone codec resolving hits through a gene catalog.
#[derive(Clone)]
pub struct CloneCodec {
    genes: Arc<GeneCatalog>,
}

impl CloneCodec {
    #[must_use]
    pub fn new(genes: Arc<GeneCatalog>) -> Self {
        Self { genes }
    }
}

impl RecordCodec<CloneRecord> for CloneCodec {
    fn encode(&self, record: &CloneRecord, out: &mut dyn Write) -> Result<()> {
        let wire = CloneWire {
            id: record.id,
            count: record.count,
            fraction: record.fraction,
            targets: record.targets.clone(),
            junction: record.junction.clone(),
            hits: record.hits.to_indices(&self.genes)?,
            tag_count: record.tag_count.clone(),
        };
        encode_value(&wire, out)
    }

    fn decode(&self, input: &mut dyn Read) -> Result<CloneRecord> {
        let wire: CloneWire = decode_value(input)?;
        Ok(CloneRecord {
            id: wire.id,
            count: wire.count,
            fraction: wire.fraction,
            targets: wire.targets,
            junction: wire.junction,
            hits: GeneHits::from_indices(wire.hits, &self.genes)?,
            tag_count: wire.tag_count,
        })
    }
}
