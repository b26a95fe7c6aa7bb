//! Error types for exec/REPL dispatch and module registration (§7).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplError {
    /// `register_host_module` given a proxy id that doesn't resolve
    /// (§4.1 "invalid id -> error value"). No state is mutated.
    #[error("invalid host module reference (proxy id {id})")]
    InvalidModuleRef { id: u32 },

    /// VFS mount point requested a capability the attached filesystem
    /// object doesn't provide (§4.6).
    #[error("filesystem backend missing required capability: {capability}")]
    MissingCapability { capability: &'static str },

    /// A stat on a missing file, translated to ImportError by the VM
    /// (§4.6 "Failure").
    #[error("import error: module not found: {name}")]
    ImportNotFound { name: String },

    /// A write to a readonly mount (§4.6 "Failure").
    #[error("io error: filesystem mount is readonly")]
    ReadonlyMount,
}

pub type ReplResult<T> = Result<T, ReplError>;
