//! Incremental UTF-8 decoding of the response body.
//!
//! Chunk boundaries from the network can fall inside a multi-byte character,
//! so the decoder carries the partial sequence over to the next call instead
//! of decoding each chunk on its own.

use encoding_rs::{CoderResult, Decoder, UTF_8};

/// Stateful UTF-8 decoder. Malformed input becomes U+FFFD, never an error.
pub struct StreamDecoder {
    inner: Decoder,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            inner: UTF_8.new_decoder_with_bom_removal(),
        }
    }

    /// Decode the next chunk. Bytes of an incomplete trailing character are
    /// held back until the following call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.run(bytes, false)
    }

    /// End of stream: flush held-back bytes (as U+FFFD if they never completed).
    pub fn finish(mut self) -> String {
        self.run(&[], true)
    }

    fn run(&mut self, mut bytes: &[u8], last: bool) -> String {
        let mut text = String::new();
        loop {
            let needed = self
                .inner
                .max_utf8_buffer_length(bytes.len())
                .unwrap_or(bytes.len().saturating_mul(3).saturating_add(4));
            text.reserve(needed);
            let (result, read, _) = self.inner.decode_to_string(bytes, &mut text, last);
            bytes = &bytes[read..];
            match result {
                CoderResult::InputEmpty => return text,
                CoderResult::OutputFull => continue,
            }
        }
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}
