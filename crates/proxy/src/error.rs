//! Error types for the proxy table (§7 "Error handling design").

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Accessing a recycled id with a stale generation (§7, P3).
    #[error("stale reference: id {id} generation {requested} (current generation {current})")]
    StaleReference {
        id: u32,
        requested: u32,
        current: u32,
    },

    /// The id has never been allocated, or is out of the table's range.
    #[error("invalid proxy id {id}")]
    InvalidId { id: u32 },

    /// Attribute lookup/store target does not have the named attribute.
    #[error("no such attribute: {name}")]
    NoSuchAttribute { name: String },

    /// The callee raised; carries the id of the exception proxy.
    #[error("callee raised exception (proxy id {exception_id})")]
    Raised { exception_id: u32 },

    /// A value could not be converted across the boundary in either
    /// direction and had to fall back to an opaque proxy; not itself fatal,
    /// but callers that require a concrete conversion surface it.
    #[error("unsupported type for direct conversion: {type_name}")]
    UnsupportedType { type_name: String },
}

pub type ProxyResult<T> = Result<T, ProxyError>;
