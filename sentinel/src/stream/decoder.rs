// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Incremental UTF-8 decoding
//
// Chunks from the network can split a multi-byte character. The decoder
// holds back an incomplete trailing sequence until the next chunk arrives.
// Invalid sequences decode to U+FFFD rather than aborting the stream.

/// Longest possible UTF-8 sequence; a held-back tail is always shorter.
const MAX_UTF8_LEN: usize = 4;

#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Leading bytes of a character whose remaining bytes have not arrived.
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, appending complete characters to `out`.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String) {
        if self.pending.is_empty() {
            self.decode_slice(bytes, out);
            return;
        }

        let mut joined = std::mem::take(&mut self.pending);
        joined.extend_from_slice(bytes);
        self.decode_slice(&joined, out);
    }

    fn decode_slice(&mut self, mut bytes: &[u8], out: &mut String) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is well formed
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[len..];
                        }
                        None => {
                            debug_assert!(rest.len() < MAX_UTF8_LEN);
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop any held-back bytes. Returns how many were discarded.
    pub fn finish(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}
