//! Cross-boundary value representation and the ABI triplet (§6, §4.2).

/// Which of the two proxy tables an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// A host object referenced by guest code.
    HostHeld,
    /// A guest object referenced by host code.
    GuestHeld,
}

/// A value that has crossed (or is about to cross) the semihosting
/// boundary. Composite objects are represented either by value (eager copy)
/// or as a proxy, per the per-kind policy described in `spec.md` §4.2.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// A reference into one of the two proxy tables.
    Proxy { id: u32, kind: ProxyKind },
    /// Same as `Proxy`, but flagged as an exception (§4.2 "is-exception
    /// flag"); always overrides the ordinary tag on the wire (§6).
    ExceptionProxy { id: u32, kind: ProxyKind },
}

impl Value {
    pub fn is_exception(&self) -> bool {
        matches!(self, Value::ExceptionProxy { .. })
    }
}

/// Wire tags for the three-word output triplet (§6 "Proxy ABI").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    None = 0,
    SmallInt = 1,
    Float64 = 2,
    Str = 3,
    Bytes = 4,
    True = 5,
    False = 6,
    Proxy = 7,
    ExceptionProxy = 8,
}

impl Tag {
    /// Decodes a raw wire byte back into a `Tag`, for a host-facing export
    /// that receives a triplet built on the other side (§6).
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Tag::None,
            1 => Tag::SmallInt,
            2 => Tag::Float64,
            3 => Tag::Str,
            4 => Tag::Bytes,
            5 => Tag::True,
            6 => Tag::False,
            7 => Tag::Proxy,
            8 => Tag::ExceptionProxy,
            _ => return None,
        })
    }
}

/// The three-machine-word output convention `(tag, payload0, payload1)`
/// (§6, GLOSSARY "Triplet"). Strings/bytes encode as (ptr, len) in
/// `payload0`/`payload1`; proxies encode as (id, kind) with `kind` stashed
/// in the high bit of `payload1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triplet {
    pub tag: Tag,
    pub payload0: u64,
    pub payload1: u64,
}

impl Triplet {
    pub const NONE: Triplet = Triplet {
        tag: Tag::None,
        payload0: 0,
        payload1: 0,
    };

    pub fn small_int(value: i64) -> Self {
        Triplet {
            tag: Tag::SmallInt,
            payload0: value as u64,
            payload1: 0,
        }
    }

    pub fn float(value: f64) -> Self {
        // Split across payloads as the spec requires; we use the full bit
        // pattern in payload0 and leave payload1 reserved for symmetry with
        // other variable-width tags.
        Triplet {
            tag: Tag::Float64,
            payload0: value.to_bits(),
            payload1: 0,
        }
    }

    pub fn bool(value: bool) -> Self {
        Triplet {
            tag: if value { Tag::True } else { Tag::False },
            payload0: 0,
            payload1: 0,
        }
    }

    /// `payload0` = pointer, `payload1` = length. The caller owns the
    /// backing buffer until it is released via the dedicated free entry
    /// point (§6, SPEC_FULL "Supplemented features" #2).
    pub fn string(ptr: usize, len: usize) -> Self {
        Triplet {
            tag: Tag::Str,
            payload0: ptr as u64,
            payload1: len as u64,
        }
    }

    pub fn bytes(ptr: usize, len: usize) -> Self {
        Triplet {
            tag: Tag::Bytes,
            payload0: ptr as u64,
            payload1: len as u64,
        }
    }

    pub fn proxy(id: u32, kind: ProxyKind) -> Self {
        Triplet {
            tag: Tag::Proxy,
            payload0: id as u64,
            payload1: kind_bit(kind),
        }
    }

    /// §4.2: "Exception flag overrides tag." Always produced instead of
    /// `Tag::Proxy` when the underlying value is an exception.
    pub fn exception_proxy(id: u32, kind: ProxyKind) -> Self {
        Triplet {
            tag: Tag::ExceptionProxy,
            payload0: id as u64,
            payload1: kind_bit(kind),
        }
    }

    pub fn is_exception(&self) -> bool {
        self.tag == Tag::ExceptionProxy
    }
}

fn kind_bit(kind: ProxyKind) -> u64 {
    match kind {
        ProxyKind::HostHeld => 0,
        ProxyKind::GuestHeld => 1,
    }
}

/// Inverse of `kind_bit`, for callers decoding a `Triplet`'s `payload1`
/// back into a `ProxyKind` (e.g. a host-facing attribute/call export that
/// has to pick which of the two proxy tables an incoming id refers to).
pub fn kind_from_bit(bit: u64) -> ProxyKind {
    if bit & 1 == 1 {
        ProxyKind::GuestHeld
    } else {
        ProxyKind::HostHeld
    }
}
