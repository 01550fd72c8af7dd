//! Chunk stream reader.
//!
//! Each chunk is `length: u32 BE`, `type: 4 ASCII bytes`, `length` bytes of
//! data, then a 4-byte CRC that is skipped unchecked. Every length is checked
//! against the bytes that remain before anything is sliced.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// PNG file signature (8 bytes).
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Length word + type code + CRC.
const CHUNK_OVERHEAD: usize = 12;

/// Four-character chunk type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: ChunkType = ChunkType(*b"IHDR");
    pub const TEXT: ChunkType = ChunkType(*b"tEXt");
    pub const IEND: ChunkType = ChunkType(*b"IEND");
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// A single chunk borrowed from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: ChunkType,
    pub data: &'a [u8],
}

/// Image dimensions from `IHDR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Read width and height from the first 8 bytes of an `IHDR` payload.
    pub fn from_ihdr(data: &[u8]) -> Option<Self> {
        Some(Self {
            width: read_u32_be(data, 0)?,
            height: read_u32_be(data, 4)?,
        })
    }
}

/// Check whether `bytes` starts with the PNG signature.
pub fn has_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Iterator over the chunks of an in-memory PNG stream.
///
/// Stops after `IEND` or when the buffer is exhausted. Yields one error and
/// then stops if a chunk does not fit in the remaining bytes.
pub struct ChunkReader<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> ChunkReader<'a> {
    /// Verify the signature and position the reader at the first chunk.
    pub fn new(buf: &'a [u8]) -> Result<Self, FormatError> {
        if buf.len() < PNG_SIGNATURE.len() {
            return Err(FormatError::TooShort { len: buf.len() });
        }
        if !has_signature(buf) {
            return Err(FormatError::InvalidSignature);
        }
        Ok(Self {
            buf,
            pos: PNG_SIGNATURE.len(),
            done: false,
        })
    }

    fn read_next(&mut self) -> Result<Option<Chunk<'a>>, FormatError> {
        let offset = self.pos;
        let remaining = self.buf.len() - offset;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < CHUNK_OVERHEAD {
            return Err(FormatError::TruncatedHeader { offset, remaining });
        }

        let header = &self.buf[offset..offset + 8];
        let declared = read_u32_be(header, 0).unwrap_or(0) as usize;
        let kind = ChunkType([header[4], header[5], header[6], header[7]]);

        let available = remaining - CHUNK_OVERHEAD;
        if declared > available {
            return Err(FormatError::TruncatedChunk {
                offset,
                kind: kind.to_string(),
                declared,
                remaining: available,
            });
        }

        let start = offset + 8;
        let data = &self.buf[start..start + declared];
        self.pos = start + declared + 4;

        tracing::trace!(chunk = %kind, offset, len = declared, "read chunk");
        Ok(Some(Chunk { kind, data }))
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Chunk<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(chunk)) => {
                if chunk.kind == ChunkType::IEND {
                    self.done = true;
                }
                Some(Ok(chunk))
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

/// The chunks the metadata extractor cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PngChunks<'a> {
    /// Dimensions from `IHDR`, if a chunk of at least 8 bytes was seen
    pub dimensions: Option<Dimensions>,
    /// Raw payloads of every `tEXt` chunk, in stream order
    pub text_chunks: Vec<&'a [u8]>,
}

/// Walk the whole stream and collect `IHDR` dimensions and `tEXt` payloads.
///
/// All other chunk types, including `zTXt` and `iTXt`, are skipped.
pub fn read_chunks(buf: &[u8]) -> Result<PngChunks<'_>, FormatError> {
    let mut out = PngChunks::default();
    for chunk in ChunkReader::new(buf)? {
        let chunk = chunk?;
        match chunk.kind {
            ChunkType::IHDR => {
                if let Some(dims) = Dimensions::from_ihdr(chunk.data) {
                    out.dimensions = Some(dims);
                }
            }
            ChunkType::TEXT => out.text_chunks.push(chunk.data),
            _ => {}
        }
    }
    Ok(out)
}

fn read_u32_be(bytes: &[u8], at: usize) -> Option<u32> {
    let word: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(word))
}
