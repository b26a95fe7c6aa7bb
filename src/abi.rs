//! The raw three-word output triplet ABI (§6 "Proxy ABI") and the arena
//! that owns string/byte buffers handed across the boundary until the
//! host calls the dedicated free entry point
//! (`SPEC_FULL.md` "Supplemented features" #2).
//!
//! This is the one place in the kernel crate that reasons about raw
//! pointers; `cpyhost-hwplane` hands out `*const u8` values too but never
//! dereferences one it didn't allocate itself. Here the pointer comes from
//! the host (`out_triplet_ptr`), so the `unsafe` is irreducible — the spec
//! itself specifies a C-ABI-equivalent pointer convention (§6).

use cpyhost_proxy::{kind_from_bit, Tag, Triplet, Value};
use std::cell::RefCell;
use std::collections::HashMap;

/// Writes `triplet` into the host-provided three-word output location
/// (§6: "writes a three-word triplet `[tag, payload0, payload1]`").
///
/// # Safety
/// `out_ptr` must be valid for three consecutive `u64` writes, per the
/// documented `do_exec`/`do_import`/etc. contract (§6).
pub unsafe fn write_triplet(out_ptr: *mut u64, triplet: Triplet) {
    std::ptr::write(out_ptr, triplet.tag as u64);
    std::ptr::write(out_ptr.add(1), triplet.payload0);
    std::ptr::write(out_ptr.add(2), triplet.payload1);
}

/// Owns every string/bytes buffer that has been handed to the host as a
/// `(ptr, len)` triplet payload but not yet released (§6: "the host frees
/// them via a dedicated free entry point").
#[derive(Default)]
pub struct OutputArena {
    live: RefCell<HashMap<usize, usize>>,
}

impl OutputArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaks `bytes` and records its extent so it can be reclaimed later.
    /// Returns the `(ptr, len)` pair the triplet's payload words encode.
    pub fn publish(&self, bytes: Vec<u8>) -> (usize, usize) {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        let ptr = Box::into_raw(boxed) as *mut u8 as usize;
        self.live.borrow_mut().insert(ptr, len);
        (ptr, len)
    }

    /// `free_triplet_payload(tag, payload0, payload1)` (`SPEC_FULL.md`
    /// supplemented feature #2): reclaims a previously published buffer.
    /// A `ptr` not currently tracked (already freed, or never a string/
    /// bytes payload) is a no-op rather than undefined behavior — the
    /// kernel's exported wrapper is the only caller and always passes
    /// through a value this arena itself produced, but double-free safety
    /// is cheap to keep here regardless.
    pub fn free(&self, ptr: usize) {
        if let Some(len) = self.live.borrow_mut().remove(&ptr) {
            // SAFETY: `ptr`/`len` were produced by a prior `Box::into_raw`
            // of a `Box<[u8]>` of exactly this length, and `live` only
            // ever yields each entry once (`remove`), so this cannot
            // double-free.
            unsafe {
                drop(Box::from_raw(std::slice::from_raw_parts_mut(
                    ptr as *mut u8,
                    len,
                )));
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }
}

/// Lowers a marshaled `Value` to its wire triplet (§6, §4.2), publishing
/// string/bytes payloads into `arena` so the host's later
/// `free_triplet_payload` call has something to reclaim.
pub fn value_to_triplet(value: Value, arena: &OutputArena) -> Triplet {
    match value {
        Value::None => Triplet::NONE,
        Value::Bool(b) => Triplet::bool(b),
        Value::Int(i) => Triplet::small_int(i),
        Value::Float(f) => Triplet::float(f),
        Value::Str(s) => {
            let (ptr, len) = arena.publish(s.into_bytes());
            Triplet::string(ptr, len)
        }
        Value::Bytes(b) => {
            let (ptr, len) = arena.publish(b);
            Triplet::bytes(ptr, len)
        }
        Value::Proxy { id, kind } => Triplet::proxy(id, kind),
        Value::ExceptionProxy { id, kind } => Triplet::exception_proxy(id, kind),
    }
}

/// Raises a wire triplet back into a `Value` (§6, §4.2), the direction a
/// host-facing `store_attr`/`call` export needs: the host hands in a
/// triplet it built itself, and this is total over every tag the ABI
/// defines. String/bytes payloads are read, not taken — the host still
/// owns that buffer after the call returns, unlike the `OutputArena`
/// buffers this crate hands out going the other way.
///
/// # Safety
/// For `Tag::Str`/`Tag::Bytes`, `payload0`/`payload1` must be a valid
/// `(ptr, len)` pair readable for the duration of this call.
pub unsafe fn triplet_to_value(triplet: Triplet) -> Value {
    match triplet.tag {
        Tag::None => Value::None,
        Tag::True => Value::Bool(true),
        Tag::False => Value::Bool(false),
        Tag::SmallInt => Value::Int(triplet.payload0 as i64),
        Tag::Float64 => Value::Float(f64::from_bits(triplet.payload0)),
        Tag::Str => {
            let slice = std::slice::from_raw_parts(triplet.payload0 as *const u8, triplet.payload1 as usize);
            Value::Str(String::from_utf8_lossy(slice).into_owned())
        }
        Tag::Bytes => {
            let slice = std::slice::from_raw_parts(triplet.payload0 as *const u8, triplet.payload1 as usize);
            Value::Bytes(slice.to_vec())
        }
        Tag::Proxy => Value::Proxy {
            id: triplet.payload0 as u32,
            kind: kind_from_bit(triplet.payload1),
        },
        Tag::ExceptionProxy => Value::ExceptionProxy {
            id: triplet.payload0 as u32,
            kind: kind_from_bit(triplet.payload1),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpyhost_proxy::Tag;

    #[test]
    fn publish_then_free_round_trips_and_untracks() {
        let arena = OutputArena::new();
        let (ptr, len) = arena.publish(b"hello".to_vec());
        assert_eq!(len, 5);
        assert_eq!(arena.live_count(), 1);
        let slice = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
        assert_eq!(slice, b"hello");
        arena.free(ptr);
        assert_eq!(arena.live_count(), 0);
    }

    #[test]
    fn freeing_an_unknown_pointer_is_a_noop() {
        let arena = OutputArena::new();
        arena.free(0xdead_beef);
        assert_eq!(arena.live_count(), 0);
    }

    #[test]
    fn string_value_publishes_into_the_arena() {
        let arena = OutputArena::new();
        let triplet = value_to_triplet(Value::Str("hi".to_string()), &arena);
        assert_eq!(triplet.tag, Tag::Str);
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    fn triplet_words_round_trip_through_a_raw_buffer() {
        let mut words = [0u64; 3];
        unsafe { write_triplet(words.as_mut_ptr(), Triplet::small_int(5)) };
        assert_eq!(words[0], Tag::SmallInt as u64);
        assert_eq!(words[1], 5);
    }
}
