//! `tEXt` payload decoding.

/// A decoded `tEXt` keyword/text pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub keyword: String,
    pub text: String,
}

impl TextChunk {
    /// Split the payload at the first NUL and decode both halves as Latin-1.
    ///
    /// A payload without a separator is all keyword with an empty text.
    pub fn decode(data: &[u8]) -> Self {
        let (keyword, text) = match data.iter().position(|&b| b == 0) {
            Some(nul) => (&data[..nul], &data[nul + 1..]),
            None => (data, &[][..]),
        };
        Self {
            keyword: latin1(keyword),
            text: latin1(text),
        }
    }
}

/// Latin-1 maps every byte to the code point of the same value.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
