use std::char::REPLACEMENT_CHARACTER;

const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Incremental UTF-8 decoder for chunked response bodies.
///
/// A multi-byte sequence split across reads is held back until the next call
/// completes it. Invalid sequences decode to U+FFFD instead of failing, and a
/// leading byte order mark is dropped.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
    started: bool,
}

impl Utf8StreamDecoder {
    /// Creates a decoder with no buffered bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one chunk, returning only the text completed by it.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut output = String::with_capacity(input.len());
        let mut rest = input.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    output.push_str(valid);
                    break;
                }
                Err(error) => {
                    let (valid, tail) = rest.split_at(error.valid_up_to());
                    output.push_str(&String::from_utf8_lossy(valid));

                    match error.error_len() {
                        Some(invalid_len) => {
                            output.push(REPLACEMENT_CHARACTER);
                            rest = &tail[invalid_len..];
                        }
                        None => {
                            // Truncated sequence at the end of the chunk.
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        self.strip_leading_bom(output)
    }

    /// Flushes any held-back bytes as a replacement character.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }

        self.pending.clear();
        self.strip_leading_bom(REPLACEMENT_CHARACTER.to_string())
    }

    fn strip_leading_bom(&mut self, output: String) -> String {
        if self.started || output.is_empty() {
            return output;
        }

        self.started = true;
        match output.strip_prefix(BYTE_ORDER_MARK) {
            Some(stripped) => stripped.to_string(),
            None => output,
        }
    }
}
