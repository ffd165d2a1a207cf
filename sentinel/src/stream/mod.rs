// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Incremental frame parsing for streamed answers
//
// Responsibilities:
// - Decode arbitrarily chunked bytes to text, carrying split characters over
// - Split text into LF-terminated lines, carrying the unterminated tail over
// - Turn `data:` lines into deltas and recognize the `[END]` sentinel
// - Ignore every other line kind

mod decoder;
mod frame;
mod parser;

pub use decoder::Utf8Decoder;
pub use frame::{parse_line, Frame, LineBuffer, DATA_PREFIX, END_SENTINEL};
pub use parser::{FrameParser, Leftover};
