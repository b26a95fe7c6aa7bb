//! The REPL's own state machine (§4.5 "REPL"), independent of the line
//! buffer: whether the next character starts a fresh primary prompt, is
//! mid-continuation, or the REPL has been asked to stop feeding the guest
//! any further input (an unrecoverable host-fatal condition reached
//! through `repl_process_char`).
//!
//! Modeled on `neo-vm`'s `vm_state.rs` bitflag-style state enum, but a
//! plain enum here: the REPL only ever occupies one of these states at a
//! time, there's no need for a bitset.

/// The three return codes `repl_process_char` hands back to the host
/// (§4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReplReturnCode {
    /// Normal: the last character completed a statement (or the buffer is
    /// still empty); show the primary prompt.
    Normal = 0,
    /// Need more input: the buffered source is an incomplete statement;
    /// show the continuation prompt.
    NeedMoreInput = 1,
    /// An interrupt was observed while processing this character.
    Interrupt = 2,
}

impl ReplReturnCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Which prompt the host should display next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Primary,
    Continuation,
}

/// The REPL's state machine. Owns nothing about the interpreter itself —
/// just enough to decide, after each pushed character, which return code
/// and prompt apply (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
    /// Waiting for the first character of a new statement.
    AtPrimaryPrompt,
    /// Mid-statement; the buffered source so far did not compile as a
    /// complete unit.
    AwaitingContinuation,
    /// An interrupt was delivered; the next pushed character starts fresh
    /// at the primary prompt, but this call itself reports `Interrupt`.
    Interrupted,
}

impl ReplState {
    pub fn prompt(self) -> Prompt {
        match self {
            ReplState::AtPrimaryPrompt | ReplState::Interrupted => Prompt::Primary,
            ReplState::AwaitingContinuation => Prompt::Continuation,
        }
    }
}

impl Default for ReplState {
    fn default() -> Self {
        ReplState::AtPrimaryPrompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_repl_state_shows_primary_prompt() {
        assert_eq!(ReplState::default().prompt(), Prompt::Primary);
    }

    #[test]
    fn continuation_state_shows_continuation_prompt() {
        assert_eq!(
            ReplState::AwaitingContinuation.prompt(),
            Prompt::Continuation
        );
    }

    #[test]
    fn return_codes_match_spec_values() {
        assert_eq!(ReplReturnCode::Normal.as_i32(), 0);
        assert_eq!(ReplReturnCode::NeedMoreInput.as_i32(), 1);
        assert_eq!(ReplReturnCode::Interrupt.as_i32(), 2);
    }
}
