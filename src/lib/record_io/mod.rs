//! Reading and writing clonekit record files.
//!
//! Every file has the same frame:
//!
//! ```text
//! MAGIC(8) | header_len: u64 | Header | body ... | Footer | index_offset: u64 | footer_offset: u64 | END_MAGIC(8)
//! ```
//!
//! The body of alignment, clone and tree files is a single framed record section. Combined
//! clone+alignment files hold a clone section followed by an alignment section grouped by
//! clone, plus a per-clone index (see [`clna`]).
//!
//! The trailer is written only by `finish`, so a file whose producer failed or was
//! interrupted has no trailer and is rejected with [`ClonekitError::UnfinishedFile`] by every
//! reader.

pub mod clna;
pub mod reader;
pub mod writer;

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::codec::{AlignmentCodec, BincodeCodec, CloneCodec, RecordCodec, decode_value};
use crate::errors::ClonekitError;
use crate::header::{Footer, Header};
use crate::model::{AlignmentRecord, CloneRecord, TreeRecord};

pub use clna::{ClnaReader, ClnaWriter};
pub use reader::{CountingReader, RecordReader};
pub use writer::RecordWriter;

/// Magic bytes closing every finished file.
pub const END_MAGIC: &[u8; 8] = b"CKFINISH";

/// Size of the trailer: index offset, footer offset, end magic.
pub(crate) const TRAILER_LEN: u64 = 24;

/// Size of the leading magic plus header length.
pub(crate) const PREAMBLE_LEN: u64 = 16;

/// The kinds of record files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Alignments,
    Clones,
    ClonesAndAlignments,
    Trees,
}

impl FileKind {
    pub const ALL: [FileKind; 4] =
        [FileKind::Alignments, FileKind::Clones, FileKind::ClonesAndAlignments, FileKind::Trees];

    #[must_use]
    pub fn magic(self) -> &'static [u8; 8] {
        match self {
            FileKind::Alignments => b"CKALNS01",
            FileKind::Clones => b"CKCLNS01",
            FileKind::ClonesAndAlignments => b"CKCLNA01",
            FileKind::Trees => b"CKTREE01",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Alignments => "alns",
            FileKind::Clones => "clns",
            FileKind::ClonesAndAlignments => "clna",
            FileKind::Trees => "trees",
        }
    }

    #[must_use]
    pub fn from_magic(magic: &[u8]) -> Option<FileKind> {
        Self::ALL.into_iter().find(|k| k.magic().as_slice() == magic)
    }

    #[must_use]
    pub fn from_extension(path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?;
        Self::ALL.into_iter().find(|k| k.extension() == ext)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Alignments => "alignments",
            FileKind::Clones => "clones",
            FileKind::ClonesAndAlignments => "clones+alignments",
            FileKind::Trees => "trees",
        };
        f.write_str(name)
    }
}

/// A record type stored in a single-section file.
pub trait StoredRecord: Sized {
    const KIND: FileKind;
    type Codec: RecordCodec<Self>;

    /// Codec for records of a file with the given header.
    fn codec(header: &Header) -> Self::Codec;
}

impl StoredRecord for AlignmentRecord {
    const KIND: FileKind = FileKind::Alignments;
    type Codec = AlignmentCodec;

    fn codec(header: &Header) -> AlignmentCodec {
        AlignmentCodec::new(header.genes.shared())
    }
}

impl StoredRecord for CloneRecord {
    const KIND: FileKind = FileKind::Clones;
    type Codec = CloneCodec;

    fn codec(header: &Header) -> CloneCodec {
        CloneCodec::new(header.genes.shared())
    }
}

impl StoredRecord for TreeRecord {
    const KIND: FileKind = FileKind::Trees;
    type Codec = BincodeCodec<TreeRecord>;

    fn codec(_header: &Header) -> BincodeCodec<TreeRecord> {
        BincodeCodec::new()
    }
}

/// Reads the magic of a file and returns its kind.
pub fn detect_kind(path: &Path) -> Result<FileKind> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut magic = [0u8; 8];
    if file.read_exact(&mut magic).is_err() {
        return Err(ClonekitError::InvalidFileFormat {
            file_type: "record".to_string(),
            path: path.display().to_string(),
            reason: "file is too short to hold a header".to_string(),
        }
        .into());
    }
    FileKind::from_magic(&magic).ok_or_else(|| {
        ClonekitError::InvalidFileFormat {
            file_type: "record".to_string(),
            path: path.display().to_string(),
            reason: "unrecognised magic bytes".to_string(),
        }
        .into()
    })
}

/// Checks that an output path carries the extension of `kind`.
pub fn validate_output_path(path: &Path, kind: FileKind) -> Result<()> {
    match FileKind::from_extension(path) {
        Some(k) if k == kind => Ok(()),
        _ => Err(ClonekitError::InvalidParameter {
            parameter: "output".to_string(),
            reason: format!(
                "'{}' must have the .{} extension for {kind} output",
                path.display(),
                kind.extension()
            ),
        }
        .into()),
    }
}

/// Header, footer and layout offsets of an opened file.
pub(crate) struct FileLayout {
    pub header: Header,
    pub footer: Footer,
    pub body_start: u64,
    pub index_offset: u64,
    pub footer_offset: u64,
}

/// Validates magic and trailer and reads header and footer.
pub(crate) fn read_layout(file: &mut File, path: &Path, expected: FileKind) -> Result<FileLayout> {
    let path_str = || path.display().to_string();
    let len = file.metadata().with_context(|| format!("Failed to stat {}", path.display()))?.len();

    let mut magic = [0u8; 8];
    file.read_exact(&mut magic).map_err(|_| ClonekitError::InvalidFileFormat {
        file_type: expected.to_string(),
        path: path_str(),
        reason: "file is too short to hold a header".to_string(),
    })?;
    match FileKind::from_magic(&magic) {
        Some(kind) if kind == expected => {}
        Some(kind) => {
            return Err(ClonekitError::WrongFileType {
                path: path_str(),
                expected: expected.to_string(),
                actual: kind.to_string(),
            }
            .into());
        }
        None => {
            return Err(ClonekitError::InvalidFileFormat {
                file_type: expected.to_string(),
                path: path_str(),
                reason: "unrecognised magic bytes".to_string(),
            }
            .into());
        }
    }

    if len < PREAMBLE_LEN + TRAILER_LEN {
        return Err(ClonekitError::UnfinishedFile { path: path_str() }.into());
    }
    file.seek(SeekFrom::Start(len - TRAILER_LEN))?;
    let mut trailer = [0u8; TRAILER_LEN as usize];
    file.read_exact(&mut trailer).with_context(|| format!("Failed to read {}", path.display()))?;
    if &trailer[16..] != END_MAGIC {
        return Err(ClonekitError::UnfinishedFile { path: path_str() }.into());
    }
    let index_offset = u64::from_le_bytes(trailer[0..8].try_into()?);
    let footer_offset = u64::from_le_bytes(trailer[8..16].try_into()?);

    let malformed = |reason: String| ClonekitError::InvalidFileFormat {
        file_type: expected.to_string(),
        path: path_str(),
        reason,
    };
    if footer_offset < PREAMBLE_LEN || footer_offset > len - TRAILER_LEN {
        return Err(malformed(format!(
            "footer offset {footer_offset} lies outside the file ({len} bytes)"
        ))
        .into());
    }

    file.seek(SeekFrom::Start(footer_offset))?;
    let footer: Footer = decode_value(&mut std::io::BufReader::new(&mut *file))
        .with_context(|| format!("Failed to read footer of {}", path.display()))?;

    file.seek(SeekFrom::Start(8))?;
    let mut len_bytes = [0u8; 8];
    file.read_exact(&mut len_bytes)?;
    let header_len = u64::from_le_bytes(len_bytes);
    if header_len > footer_offset - PREAMBLE_LEN {
        return Err(malformed(format!(
            "header length {header_len} exceeds the {} bytes before the footer",
            footer_offset - PREAMBLE_LEN
        ))
        .into());
    }
    let mut header_bytes = vec![0u8; usize::try_from(header_len)?];
    file.read_exact(&mut header_bytes)
        .with_context(|| format!("Failed to read header of {}", path.display()))?;
    let header: Header = decode_value(&mut header_bytes.as_slice())
        .with_context(|| format!("Failed to decode header of {}", path.display()))?;

    Ok(FileLayout {
        header,
        footer,
        body_start: PREAMBLE_LEN + header_len,
        index_offset,
        footer_offset,
    })
}

/// Writes magic, header length and header.
pub(crate) fn write_preamble(out: &mut dyn Write, kind: FileKind, header: &Header) -> Result<u64> {
    let mut bytes = Vec::new();
    crate::codec::encode_value(header, &mut bytes)?;
    out.write_all(kind.magic())?;
    out.write_all(&(bytes.len() as u64).to_le_bytes())?;
    out.write_all(&bytes)?;
    Ok(PREAMBLE_LEN + bytes.len() as u64)
}

/// Writes footer and trailer; `position` is the current offset of `out`.
pub(crate) fn write_footer(
    out: &mut dyn Write,
    position: u64,
    index_offset: u64,
    footer: &Footer,
) -> Result<()> {
    crate::codec::encode_value(footer, out)?;
    out.write_all(&index_offset.to_le_bytes())?;
    out.write_all(&position.to_le_bytes())?;
    out.write_all(END_MAGIC)?;
    Ok(())
}

/// Any opened record file, dispatched on its kind.
pub enum RecordFile {
    Alignments(RecordReader<AlignmentRecord>),
    Clones(RecordReader<CloneRecord>),
    ClonesAndAlignments(ClnaReader),
    Trees(RecordReader<TreeRecord>),
}

impl RecordFile {
    /// Opens a file of whatever kind its magic says.
    pub fn open(path: &Path) -> Result<RecordFile> {
        Ok(match detect_kind(path)? {
            FileKind::Alignments => RecordFile::Alignments(RecordReader::open(path)?),
            FileKind::Clones => RecordFile::Clones(RecordReader::open(path)?),
            FileKind::ClonesAndAlignments => RecordFile::ClonesAndAlignments(ClnaReader::open(path)?),
            FileKind::Trees => RecordFile::Trees(RecordReader::open(path)?),
        })
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        match self {
            RecordFile::Alignments(_) => FileKind::Alignments,
            RecordFile::Clones(_) => FileKind::Clones,
            RecordFile::ClonesAndAlignments(_) => FileKind::ClonesAndAlignments,
            RecordFile::Trees(_) => FileKind::Trees,
        }
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        match self {
            RecordFile::Alignments(r) => r.header(),
            RecordFile::Clones(r) => r.header(),
            RecordFile::ClonesAndAlignments(r) => r.header(),
            RecordFile::Trees(r) => r.header(),
        }
    }

    #[must_use]
    pub fn footer(&self) -> &Footer {
        match self {
            RecordFile::Alignments(r) => r.footer(),
            RecordFile::Clones(r) => r.footer(),
            RecordFile::ClonesAndAlignments(r) => r.footer(),
            RecordFile::Trees(r) => r.footer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case("out.alns", Some(FileKind::Alignments))]
    #[case("out.clns", Some(FileKind::Clones))]
    #[case("dir/x.clna", Some(FileKind::ClonesAndAlignments))]
    #[case("x.trees", Some(FileKind::Trees))]
    #[case("x.bam", None)]
    #[case("noext", None)]
    fn test_kind_from_extension(#[case] path: &str, #[case] expected: Option<FileKind>) {
        assert_eq!(FileKind::from_extension(&PathBuf::from(path)), expected);
    }

    #[test]
    fn test_magic_roundtrip() {
        for kind in FileKind::ALL {
            assert_eq!(FileKind::from_magic(kind.magic()), Some(kind));
        }
        assert_eq!(FileKind::from_magic(b"NOTMAGIC"), None);
    }

    #[test]
    fn test_validate_output_path() {
        assert!(validate_output_path(Path::new("a.clns"), FileKind::Clones).is_ok());
        let err = validate_output_path(Path::new("a.alns"), FileKind::Clones).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClonekitError>(),
            Some(ClonekitError::InvalidParameter { .. })
        ));
    }

    fn finished_empty_file(dir: &Path) -> PathBuf {
        let path = dir.join("empty.alns");
        let writer = RecordWriter::<AlignmentRecord>::create(&path, &Header::default()).unwrap();
        writer.finish(&Footer::new(0)).unwrap();
        path
    }

    fn assert_invalid_format(path: &Path) {
        let err = RecordReader::<AlignmentRecord>::open(path).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ClonekitError>(),
            Some(ClonekitError::InvalidFileFormat { .. })
        ));
    }

    #[test]
    fn test_oversized_header_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = finished_empty_file(dir.path());
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8..16].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert_invalid_format(&path);
    }

    #[test]
    fn test_footer_offset_past_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = finished_empty_file(dir.path());
        let mut bytes = std::fs::read(&path).unwrap();
        let at = bytes.len() - 16;
        bytes[at..at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert_invalid_format(&path);
    }

    #[test]
    fn test_detect_kind_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.alns");
        std::fs::write(&path, b"hello world, not a record file").unwrap();
        assert!(detect_kind(&path).is_err());
    }
}
