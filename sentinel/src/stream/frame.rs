// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Line buffering and frame extraction
//
// Wire format: LF-terminated lines, optional CR before the LF. Only lines
// starting with `data:` carry payload. One space after the prefix is a
// separator; everything else is payload, verbatim.

/// Prefix of payload-carrying lines.
pub const DATA_PREFIX: &str = "data:";

/// Payload that ends the stream.
pub const END_SENTINEL: &str = "[END]";

/// A recognized frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text to append to the in-flight message. An empty `data:` payload
    /// arrives here as `"\n"`.
    Delta(String),
    /// The `[END]` sentinel.
    End,
}

/// Interpret one complete line (terminator already removed).
///
/// Returns `None` for lines that carry no payload: blank separators,
/// comments, `event:`/`id:` lines, anything unrecognized.
pub fn parse_line(line: &str) -> Option<Frame> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    if payload == END_SENTINEL {
        Some(Frame::End)
    } else if payload.is_empty() {
        Some(Frame::Delta("\n".to_string()))
    } else {
        Some(Frame::Delta(payload.to_string()))
    }
}

/// Accumulates decoded text and hands out complete lines.
///
/// Invariant: after `next_line` returns `None`, the buffer holds only an
/// unterminated tail (no `\n`).
#[derive(Debug, Default)]
pub struct LineBuffer {
    tail: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable access for the decoder to append into.
    pub fn text_mut(&mut self) -> &mut String {
        &mut self.tail
    }

    /// Remove and return the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.tail.find('\n')?;
        let mut line: String = self.tail.drain(..=newline).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// The unterminated tail currently held.
    pub fn pending(&self) -> &str {
        &self.tail
    }

    /// Drop the unterminated tail. Returns how many bytes were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.tail.len();
        self.tail.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_separator_space_stripped() {
        assert_eq!(parse_line("data: Hello"), Some(Frame::Delta("Hello".into())));
    }

    #[test]
    fn further_leading_spaces_preserved() {
        assert_eq!(parse_line("data:  Hello"), Some(Frame::Delta(" Hello".into())));
        assert_eq!(parse_line("data:   x  "), Some(Frame::Delta("  x  ".into())));
    }

    #[test]
    fn no_separator_space_is_fine() {
        assert_eq!(parse_line("data:Hello"), Some(Frame::Delta("Hello".into())));
    }

    #[test]
    fn empty_payload_is_newline() {
        assert_eq!(parse_line("data:"), Some(Frame::Delta("\n".into())));
        assert_eq!(parse_line("data: "), Some(Frame::Delta("\n".into())));
    }

    #[test]
    fn sentinel_with_and_without_separator() {
        assert_eq!(parse_line("data:[END]"), Some(Frame::End));
        assert_eq!(parse_line("data: [END]"), Some(Frame::End));
    }

    #[test]
    fn near_sentinels_are_payload() {
        assert_eq!(parse_line("data:  [END]"), Some(Frame::Delta(" [END]".into())));
        assert_eq!(parse_line("data: [END] "), Some(Frame::Delta("[END] ".into())));
        assert_eq!(parse_line("data: [end]"), Some(Frame::Delta("[end]".into())));
    }

    #[test]
    fn non_data_lines_ignored() {
        for line in ["", ": ping - 2024-01-01", "event: message", "id: 7", "retry: 1000", " data: x", "DATA: x"] {
            assert_eq!(parse_line(line), None, "line {line:?} should be ignored");
        }
    }

    #[test]
    fn payload_is_not_escaped_or_normalized() {
        assert_eq!(
            parse_line("data: <b>&amp;</b>\t"),
            Some(Frame::Delta("<b>&amp;</b>\t".into()))
        );
    }

    #[test]
    fn line_buffer_keeps_only_unterminated_tail() {
        let mut buf = LineBuffer::new();
        buf.text_mut().push_str("data: a\r\ndata: b\ndata: c");

        assert_eq!(buf.next_line().as_deref(), Some("data: a"));
        assert_eq!(buf.next_line().as_deref(), Some("data: b"));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.pending(), "data: c");
        assert!(!buf.pending().contains('\n'));

        buf.text_mut().push_str("ontinued\n");
        assert_eq!(buf.next_line().as_deref(), Some("data: continued"));
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn lone_carriage_return_inside_line_is_kept() {
        let mut buf = LineBuffer::new();
        buf.text_mut().push_str("data: a\rb\n");
        assert_eq!(buf.next_line().as_deref(), Some("data: a\rb"));
    }

    #[test]
    fn clear_reports_discarded_bytes() {
        let mut buf = LineBuffer::new();
        buf.text_mut().push_str("data: partial");
        assert_eq!(buf.clear(), 13);
        assert_eq!(buf.pending(), "");
    }
}
