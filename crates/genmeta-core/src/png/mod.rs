//! PNG container parsing.
//!
//! - **chunk**: Walk the chunk stream, pick out `IHDR` dimensions and `tEXt` payloads
//! - **text**: Decode a `tEXt` payload into its keyword/text pair
//!
//! Only the container is read. Pixel data, compressed text chunks and CRCs
//! are never touched.

pub mod chunk;
pub mod text;

pub use chunk::{
    has_signature, read_chunks, Chunk, ChunkReader, ChunkType, Dimensions, PngChunks,
    PNG_SIGNATURE,
};
pub use text::TextChunk;
