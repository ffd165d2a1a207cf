// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Frame parser -- bytes in, frames out
//
// Feeds arbitrarily chunked bytes through the UTF-8 decoder and line buffer
// and yields the frames of every complete line. Once the sentinel has been
// seen the parser is terminated and ignores all further input.

use super::decoder::Utf8Decoder;
use super::frame::{parse_line, Frame, LineBuffer};

/// Incremental parser for one streaming operation.
#[derive(Debug, Default)]
pub struct FrameParser {
    decoder: Utf8Decoder,
    lines: LineBuffer,
    terminated: bool,
}

/// What was left unprocessed when the stream ended without the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Leftover {
    /// Bytes of an unterminated final line.
    pub line_bytes: usize,
    /// Bytes of an incomplete final character.
    pub undecoded_bytes: usize,
}

impl Leftover {
    pub fn is_empty(&self) -> bool {
        self.line_bytes == 0 && self.undecoded_bytes == 0
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one chunk and return the frames it completed, in order.
    ///
    /// If the chunk contains the sentinel, `Frame::End` is the last frame
    /// returned and the rest of the chunk is dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.terminated {
            return frames;
        }

        self.decoder.decode(chunk, self.lines.text_mut());

        while let Some(line) = self.lines.next_line() {
            match parse_line(&line) {
                Some(Frame::End) => {
                    self.terminate();
                    frames.push(Frame::End);
                    break;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }

        frames
    }

    /// True once the sentinel has been recognized.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Close out the stream, discarding any unterminated tail.
    pub fn finish(&mut self) -> Leftover {
        let leftover = Leftover {
            line_bytes: self.lines.clear(),
            undecoded_bytes: self.decoder.finish(),
        };
        self.terminated = true;
        leftover
    }

    /// The unterminated text currently buffered.
    pub fn pending(&self) -> &str {
        self.lines.pending()
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.lines.clear();
        self.decoder.finish();
    }
}
