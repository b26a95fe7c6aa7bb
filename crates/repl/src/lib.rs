//! REPL & Exec Dispatch (C5) and Module Registry & VFS Attach (C6).
//! See `spec.md` §4.5, §4.6.

pub mod error;
pub mod exception;
pub mod interpreter;
pub mod line_buffer;
pub mod registry;
pub mod state;

pub use error::{ReplError, ReplResult};
pub use exception::ExceptionInfo;
pub use interpreter::{CompileOutcome, ExecOutcome, ImportOutcome, Interpreter};
pub use line_buffer::{LineBuffer, PushOutcome};
pub use registry::{Capabilities, ModuleRegistry, VfsMount, VFS_IMPORT_PATH};
pub use state::{Prompt, ReplReturnCode, ReplState};

/// Whether stdout/stderr are flushed to their callbacks a line at a time
/// or a character at a time (§6 "Configuration at init", `linebuffer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    LineBuffered,
    CharMode,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::LineBuffered
    }
}

/// The character-driven REPL loop (§4.5). Generic over the concrete
/// `Interpreter` so this crate never names `rustpython-vm` directly; the
/// kernel crate instantiates `Repl<RustPythonInterpreter>`.
pub struct Repl<I: Interpreter> {
    state: ReplState,
    buffer: LineBuffer,
    interpreter: I,
    last_outcome: Option<ExecOutcome>,
}

impl<I: Interpreter> Repl<I> {
    pub fn new(interpreter: I) -> Self {
        Self {
            state: ReplState::default(),
            buffer: LineBuffer::new(),
            interpreter,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> ReplState {
        self.state
    }

    pub fn prompt(&self) -> Prompt {
        self.state.prompt()
    }

    pub fn last_outcome(&self) -> Option<&ExecOutcome> {
        self.last_outcome.as_ref()
    }

    /// `repl_process_char` (§6): feeds one character to the REPL.
    /// `interrupted` reflects the scheduler's interrupt flag, sampled by
    /// the kernel before the call — this crate owns no interrupt flag of
    /// its own (§5 "shared resource policy": the flag lives alongside the
    /// scheduler, one level up in dependency order).
    pub fn process_char(&mut self, c: char, interrupted: bool) -> ReplReturnCode {
        if interrupted {
            self.buffer.reset();
            self.state = ReplState::Interrupted;
            return ReplReturnCode::Interrupt;
        }
        match self.buffer.push_char(c) {
            PushOutcome::Buffered => {
                self.state = ReplState::AwaitingContinuation;
                ReplReturnCode::NeedMoreInput
            }
            PushOutcome::LineReady => match self.interpreter.compile_repl_chunk(self.buffer.source()) {
                CompileOutcome::NeedMoreInput => {
                    self.state = ReplState::AwaitingContinuation;
                    ReplReturnCode::NeedMoreInput
                }
                CompileOutcome::Complete(outcome) => {
                    self.last_outcome = Some(outcome);
                    self.buffer.reset();
                    self.state = ReplState::AtPrimaryPrompt;
                    ReplReturnCode::Normal
                }
            },
        }
    }

    /// En bloc variant of `process_char` for a full line pushed at once;
    /// returns the code from the final character only (§4.5 "a small
    /// buffer... so a full line of host input may be pushed en bloc").
    pub fn process_str(&mut self, chunk: &str, interrupted: bool) -> ReplReturnCode {
        if interrupted {
            self.buffer.reset();
            self.state = ReplState::Interrupted;
            return ReplReturnCode::Interrupt;
        }
        let mut code = ReplReturnCode::Normal;
        for c in chunk.chars() {
            code = self.process_char(c, false);
        }
        code
    }

    /// One-shot `exec` (§4.5): no buffering, no prompt state transitions.
    pub fn exec(&mut self, source: &str) -> ExecOutcome {
        self.interpreter.exec(source)
    }

    pub fn import(&mut self, name: &str) -> ImportOutcome {
        self.interpreter.import(name)
    }

    /// §4.1 `register_host_module`: forwards to the concrete interpreter so
    /// `sys.modules[name]`'s attribute lookup is wired to the host proxy id
    /// before the next `import(name)` or `exec` sees it (§4.6).
    pub fn register_host_module(&mut self, name: &str, host_proxy_id: u32) {
        self.interpreter.register_host_module(name, host_proxy_id);
    }

    /// §4.6 "VFS attach": forwarded once the kernel's `ModuleRegistry` has
    /// accepted the mount (capability check already passed by the time
    /// this is called).
    pub fn attach_vfs_root(&mut self, mount_proxy_id: u32) {
        self.interpreter.attach_vfs_root(mount_proxy_id);
    }

    /// Re-entry point after a soft reset (§4.4 "re-enters the REPL").
    /// Discards any partially typed statement; the interpreter itself is
    /// reset separately by the kernel.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.state = ReplState::default();
        self.last_outcome = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::mock::MockInterpreter;

    #[test]
    fn empty_exec_returns_none_b1() {
        let mut repl = Repl::new(MockInterpreter::new());
        assert_eq!(repl.exec(""), ExecOutcome::Value(cpyhost_proxy::Value::None));
    }

    #[test]
    fn simple_arithmetic_line_completes_normally_s1_like() {
        let mut repl = Repl::new(MockInterpreter::new());
        assert_eq!(repl.process_str("2+3", false), ReplReturnCode::NeedMoreInput);
        assert_eq!(repl.process_char('\r', false), ReplReturnCode::Normal);
        assert_eq!(
            repl.last_outcome(),
            Some(&ExecOutcome::Value(cpyhost_proxy::Value::Int(5)))
        );
    }

    #[test]
    fn print_call_line_completes_with_return_code_zero_s5() {
        let mut repl = Repl::new(MockInterpreter::new());
        let mut last = ReplReturnCode::NeedMoreInput;
        for c in "print(1+1)\r".chars() {
            last = repl.process_char(c, false);
        }
        assert_eq!(last, ReplReturnCode::Normal);
    }

    #[test]
    fn backslash_continuation_requests_more_input() {
        let mut repl = Repl::new(MockInterpreter::new());
        let code = repl.process_str("x = 1 + \\\n", false);
        assert_eq!(code, ReplReturnCode::NeedMoreInput);
        assert_eq!(repl.prompt(), Prompt::Continuation);
    }

    #[test]
    fn interrupt_mid_statement_discards_buffer_and_returns_code_two() {
        let mut repl = Repl::new(MockInterpreter::new());
        repl.process_str("while True", false);
        let code = repl.process_char('x', true);
        assert_eq!(code, ReplReturnCode::Interrupt);
        assert_eq!(repl.prompt(), Prompt::Primary);
    }

    #[test]
    fn exception_round_trip_s6() {
        let mut repl = Repl::new(MockInterpreter::new());
        match repl.exec("1/0") {
            ExecOutcome::Raised(info) => assert_eq!(info.type_name, "ZeroDivisionError"),
            other => panic!("expected exception, got {other:?}"),
        }
    }

    #[test]
    fn reset_clears_buffered_state() {
        let mut repl = Repl::new(MockInterpreter::new());
        repl.process_str("if True:", false);
        repl.reset();
        assert_eq!(repl.prompt(), Prompt::Primary);
        assert!(repl.last_outcome().is_none());
    }

    #[test]
    fn module_reimport_returns_same_id_r3() {
        let mut repl = Repl::new(MockInterpreter::new());
        let first = repl.import("sys");
        let second = repl.import("sys");
        assert_eq!(first, second);
    }
}
