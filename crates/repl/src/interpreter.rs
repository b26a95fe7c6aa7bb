//! The embedded interpreter boundary.
//!
//! `spec.md` §1 places the Python VM itself (lexer, parser, compiler,
//! bytecode interpreter, GC) out of scope: "consumed as a library". This
//! trait is that seam. The kernel crate provides the production
//! implementation backed by `rustpython-vm`; this crate's exec/REPL
//! dispatch logic (line buffering, prompt state, exception marshaling)
//! only ever talks to the trait, so it stays testable without pulling in a
//! full Python implementation and stays correct even if the upstream
//! interpreter crate's API surface drifts.

use crate::exception::ExceptionInfo;
use cpyhost_proxy::Value;

/// Result of a one-shot `exec()` or a completed REPL chunk (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// The chunk ran to completion; this is its return value, already
    /// marshaled through the proxy table where necessary.
    Value(Value),
    /// The chunk raised; the exception has already been registered as a
    /// guest-held proxy.
    Raised(ExceptionInfo),
}

/// Result of feeding the REPL's line-oriented compiler a (possibly partial)
/// source unit (§4.5 "REPL").
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    /// The source is a complete statement/expression; `outcome` is the
    /// result of running it.
    Complete(ExecOutcome),
    /// More input is needed before this can be compiled (continuation
    /// prompt).
    NeedMoreInput,
}

/// Result of `do_import(name)` (§4.1 "import error is returned as
/// exception, not raised").
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Module(u32),
    Raised(ExceptionInfo),
}

/// The embedded interpreter, as consumed by `cpyhost-repl`. One instance
/// per `Kernel`; not `Clone` — there is exactly one guest execution
/// context (§5 "Scheduling model").
pub trait Interpreter: Send {
    /// One-shot exec (§4.5): lexes with leading-indent stripping, compiles
    /// to a module-scope function, calls it.
    fn exec(&mut self, source: &str) -> ExecOutcome;

    /// Attempts to compile `source` (the REPL's full buffered input so far)
    /// as one interactive unit.
    fn compile_repl_chunk(&mut self, source: &str) -> CompileOutcome;

    fn import(&mut self, name: &str) -> ImportOutcome;

    /// Registers `sys.modules[name]` as a module whose attribute lookup
    /// forwards to the given host proxy id (§4.6). Overwrites any existing
    /// registration for `name`.
    fn register_host_module(&mut self, name: &str, host_proxy_id: u32);

    /// `sys.path` initialization (§4.1): root-relative `""` entry plus any
    /// configured default paths, in order.
    fn init_sys_path(&mut self, default_paths: &[String]);

    fn attach_vfs_root(&mut self, mount_proxy_id: u32);
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use super::*;
    use cpyhost_proxy::ProxyKind;
    use std::collections::HashMap;

    /// A deliberately tiny stand-in interpreter used by this crate's own
    /// tests. It understands just enough of a handful of literal programs
    /// (`"2+3"`, `"1/0"`, `"import sys"`, …) to exercise the dispatch logic
    /// around it — it is not, and does not try to be, a Python
    /// implementation.
    #[derive(Default)]
    pub struct MockInterpreter {
        pub modules: HashMap<String, u32>,
        pub sys_path: Vec<String>,
        next_exception_id: u32,
    }

    impl MockInterpreter {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Interpreter for MockInterpreter {
        fn exec(&mut self, source: &str) -> ExecOutcome {
            let trimmed = source.trim();
            if trimmed.is_empty() {
                return ExecOutcome::Value(Value::None);
            }
            if trimmed == "1/0" {
                self.next_exception_id += 1;
                return ExecOutcome::Raised(ExceptionInfo::new(
                    self.next_exception_id,
                    "ZeroDivisionError",
                    "division by zero",
                ));
            }
            if let Some((a, b)) = trimmed.split_once('+') {
                if let (Ok(a), Ok(b)) = (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
                    return ExecOutcome::Value(Value::Int(a + b));
                }
            }
            ExecOutcome::Value(Value::None)
        }

        fn compile_repl_chunk(&mut self, source: &str) -> CompileOutcome {
            if source.ends_with('\\') {
                return CompileOutcome::NeedMoreInput;
            }
            CompileOutcome::Complete(self.exec(source))
        }

        fn import(&mut self, name: &str) -> ImportOutcome {
            if let Some(&id) = self.modules.get(name) {
                return ImportOutcome::Module(id);
            }
            if name == "sys" {
                let id = 1;
                self.modules.insert(name.to_string(), id);
                return ImportOutcome::Module(id);
            }
            self.next_exception_id += 1;
            ImportOutcome::Raised(ExceptionInfo::new(
                self.next_exception_id,
                "ImportError",
                format!("no module named '{name}'"),
            ))
        }

        fn register_host_module(&mut self, name: &str, host_proxy_id: u32) {
            self.modules.insert(name.to_string(), host_proxy_id);
        }

        fn init_sys_path(&mut self, default_paths: &[String]) {
            self.sys_path = std::iter::once(String::new())
                .chain(default_paths.iter().cloned())
                .collect();
        }

        fn attach_vfs_root(&mut self, _mount_proxy_id: u32) {}
    }

    /// So tests can assert a `ProxyKind` without importing it separately.
    pub const GUEST_HELD: ProxyKind = ProxyKind::GuestHeld;
}
