//! Character-driven REPL input buffering (§4.5 "the host pushes one
//! character at a time... maintains its own line buffer and compile
//! state").
//!
//! Two buffering levels, matching the spec text precisely: a *line*
//! accumulates individual pushed characters until a line terminator; a
//! *source* buffer accumulates complete lines across a continuation
//! (`AwaitingContinuation`) until the interpreter reports the statement
//! complete. "A small buffer sits between the host and the REPL so a full
//! line of host input may be pushed en bloc" is `push_str`.

/// `\r` and `\n` both terminate a line; a lone `\r\n` pair is collapsed by
/// treating `\n` immediately after a line-ending `\r` as a no-op rather
/// than a second empty line.
fn is_line_terminator(c: char) -> bool {
    c == '\r' || c == '\n'
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Characters of the line currently being typed, not yet terminated.
    current_line: String,
    /// Complete lines accumulated so far this statement (continuation).
    source: String,
    just_terminated: bool,
}

/// What pushing one character did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The character was buffered; no line was completed.
    Buffered,
    /// A line terminator completed `current_line`; `source` now holds the
    /// full accumulated statement text and is ready to offer to the
    /// interpreter's compiler.
    LineReady,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_char(&mut self, c: char) -> PushOutcome {
        if is_line_terminator(c) {
            if c == '\n' && self.just_terminated {
                self.just_terminated = false;
                return PushOutcome::Buffered;
            }
            self.source.push_str(&self.current_line);
            self.source.push('\n');
            self.current_line.clear();
            self.just_terminated = true;
            return PushOutcome::LineReady;
        }
        self.just_terminated = false;
        self.current_line.push(c);
        PushOutcome::Buffered
    }

    /// En bloc push of a full line of host input (spec's "small buffer...
    /// pushed en bloc"). Returns whether the final character completed a
    /// line.
    pub fn push_str(&mut self, chunk: &str) -> PushOutcome {
        let mut outcome = PushOutcome::Buffered;
        for c in chunk.chars() {
            outcome = self.push_char(c);
        }
        outcome
    }

    /// The full accumulated source for the statement in progress,
    /// including all completed lines but not the still-unterminated tail.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Call after the interpreter reports the buffered source compiles as
    /// a complete unit (or after an interrupt discards it).
    pub fn reset(&mut self) {
        self.current_line.clear();
        self.source.clear();
        self.just_terminated = false;
    }

    pub fn is_empty(&self) -> bool {
        self.current_line.is_empty() && self.source.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_becomes_ready_on_terminator() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push_str("print(1+1)"), PushOutcome::Buffered);
        assert_eq!(buf.push_char('\r'), PushOutcome::LineReady);
        assert_eq!(buf.source(), "print(1+1)\n");
    }

    #[test]
    fn crlf_pair_is_one_terminator() {
        let mut buf = LineBuffer::new();
        buf.push_str("x=1");
        buf.push_char('\r');
        buf.push_char('\n');
        assert_eq!(buf.source(), "x=1\n");
    }

    #[test]
    fn reset_clears_both_levels() {
        let mut buf = LineBuffer::new();
        buf.push_str("x=1\r");
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.source(), "");
    }

    #[test]
    fn multi_line_continuation_accumulates() {
        let mut buf = LineBuffer::new();
        buf.push_str("if True:\n");
        buf.push_str("    pass\n");
        assert_eq!(buf.source(), "if True:\n    pass\n");
    }
}
