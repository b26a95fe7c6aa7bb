//! The proxy table itself (§4.2), modeled on `neo-vm`'s `ReferenceCounter`
//! (`reference_counter.rs`) but extended with a generation counter per slot
//! so a released and reused id can be told apart from its former self
//! (§3 "Proxy reference" invariants, §8 P2/P3).

use crate::error::{ProxyError, ProxyResult};
use crate::value::{ProxyKind, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Anything that can sit behind a proxy id and be reached via attribute or
/// call forwarding (§4.2 "Attribute & call forwarding"). Implemented once
/// per side: a `HostObject` wraps a `wasm_bindgen::JsValue` (or a stub, off
/// `wasm32`); a `GuestObject` wraps a `rustpython_vm::PyObjectRef`. Kept
/// here as a trait so the table itself never needs to know which.
pub trait ProxyObject: fmt::Debug + Send {
    fn get_attr(&self, name: &str) -> ProxyResult<Value>;

    /// Storing an attribute is also the mechanism by which guest peripheral
    /// code pushes state to a host "twin" object (§4.2 "the JsProxy
    /// pattern"): the call itself is the notification, there is no separate
    /// event API.
    fn set_attr(&mut self, name: &str, value: Value) -> ProxyResult<()>;

    fn call(&self, args: &[Value]) -> ProxyResult<Value>;

    /// Runs when the slot's strong count reaches zero and is reclaimed.
    /// Must tolerate being invoked from the other side's collector
    /// (§9 "Cyclic object graphs").
    fn finalize(&mut self) {}
}

struct Slot {
    object: Option<Box<dyn ProxyObject>>,
    strong_count: u32,
    generation: u32,
}

impl Slot {
    fn empty(generation: u32) -> Self {
        Self {
            object: None,
            strong_count: 0,
            generation,
        }
    }
}

/// One directional registry: opaque integer ids -> live objects on the
/// other side of the boundary. `ProxyTable` is used twice, symmetrically,
/// for "guest holds host objects" and "host holds guest objects" (§3).
#[derive(Clone)]
pub struct ProxyTable {
    inner: Arc<Mutex<Inner>>,
    kind: ProxyKind,
}

struct Inner {
    slots: Vec<Slot>,
    free_list: VecDeque<usize>,
    /// Slots whose strong count hit zero but haven't been reclaimed yet
    /// (reclaim happens at the next `sync_reclaim` call, usually at a
    /// top-level boundary crossing — see `cpyhost` kernel `post_init`/exec).
    pending_reclaim: VecDeque<usize>,
}

impl ProxyTable {
    /// Id 0 is reserved for the host global scope / guest `__main__`
    /// (§3 "Proxy reference"). It is pre-allocated here with no object;
    /// `bind_root` gives it one.
    pub fn new(kind: ProxyKind) -> Self {
        let root = Slot::empty(0);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: vec![root],
                free_list: VecDeque::new(),
                pending_reclaim: VecDeque::new(),
            })),
            kind,
        }
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    /// Binds id 0 to the root scope object. Idempotent: a later call
    /// replaces the previous root without touching its generation, since
    /// id 0 is never recycled.
    pub fn bind_root(&self, object: Box<dyn ProxyObject>) {
        let mut inner = self.inner.lock().expect("proxy table lock poisoned");
        inner.slots[0].object = Some(object);
        inner.slots[0].strong_count = u32::MAX; // never collected
    }

    /// Registers a new object and returns its id with one strong reference
    /// already counted (§4.2 "add(obj) -> id").
    pub fn add(&self, object: Box<dyn ProxyObject>) -> u32 {
        let mut inner = self.inner.lock().expect("proxy table lock poisoned");
        let id = if let Some(id) = inner.free_list.pop_front() {
            inner.slots[id].object = Some(object);
            inner.slots[id].strong_count = 1;
            id
        } else {
            inner.slots.push(Slot {
                object: Some(object),
                strong_count: 1,
                generation: 0,
            });
            inner.slots.len() - 1
        };
        tracing::trace!(kind = ?self.kind, id, "proxy registered");
        id as u32
    }

    fn generation_of(inner: &Inner, id: usize) -> u32 {
        inner.slots.get(id).map(|s| s.generation).unwrap_or(0)
    }

    /// §4.2 "get(id) -> obj | error". Fails distinctly for an id from a
    /// previous generation (P3) versus one never allocated at all.
    pub fn with<R>(&self, id: u32, f: impl FnOnce(&dyn ProxyObject) -> R) -> ProxyResult<R> {
        let inner = self.inner.lock().expect("proxy table lock poisoned");
        let slot = inner
            .slots
            .get(id as usize)
            .ok_or(ProxyError::InvalidId { id })?;
        match &slot.object {
            Some(obj) => Ok(f(obj.as_ref())),
            None => Err(ProxyError::StaleReference {
                id,
                requested: slot.generation,
                current: slot.generation,
            }),
        }
    }

    pub fn with_mut<R>(
        &self,
        id: u32,
        f: impl FnOnce(&mut dyn ProxyObject) -> R,
    ) -> ProxyResult<R> {
        let mut inner = self.inner.lock().expect("proxy table lock poisoned");
        let slot = inner
            .slots
            .get_mut(id as usize)
            .ok_or(ProxyError::InvalidId { id })?;
        match &mut slot.object {
            Some(obj) => Ok(f(obj.as_mut())),
            None => Err(ProxyError::StaleReference {
                id,
                requested: slot.generation,
                current: slot.generation,
            }),
        }
    }

    /// Verifies an id is still current for the generation the caller last
    /// observed; used by hosts that cache `(id, generation)` pairs rather
    /// than re-deriving the generation on every access.
    pub fn check_generation(&self, id: u32, expected_generation: u32) -> ProxyResult<()> {
        let inner = self.inner.lock().expect("proxy table lock poisoned");
        let current = Self::generation_of(&inner, id as usize);
        if current != expected_generation {
            return Err(ProxyError::StaleReference {
                id,
                requested: expected_generation,
                current,
            });
        }
        Ok(())
    }

    pub fn generation(&self, id: u32) -> u32 {
        let inner = self.inner.lock().expect("proxy table lock poisoned");
        Self::generation_of(&inner, id as usize)
    }

    pub fn add_ref(&self, id: u32) {
        let mut inner = self.inner.lock().expect("proxy table lock poisoned");
        if let Some(slot) = inner.slots.get_mut(id as usize) {
            if slot.strong_count != u32::MAX {
                slot.strong_count += 1;
            }
        }
    }

    /// Decrements the slot's ref-count; on zero, enqueues it for reclaim
    /// rather than freeing it immediately, so a finalizer never runs in the
    /// middle of whatever operation triggered the release (§4.2 "Release").
    pub fn release(&self, id: u32) {
        let mut inner = self.inner.lock().expect("proxy table lock poisoned");
        let Some(slot) = inner.slots.get_mut(id as usize) else {
            return;
        };
        if slot.strong_count == 0 || slot.strong_count == u32::MAX {
            return;
        }
        slot.strong_count -= 1;
        if slot.strong_count == 0 {
            inner.pending_reclaim.push_back(id as usize);
        }
    }

    pub fn reference_count(&self, id: u32) -> u32 {
        let inner = self.inner.lock().expect("proxy table lock poisoned");
        inner
            .slots
            .get(id as usize)
            .map(|s| s.strong_count)
            .unwrap_or(0)
    }

    /// Finalizes and frees every slot queued for reclaim, bumping each
    /// slot's generation so a stale id can never alias a fresh object
    /// (§8 P3). Called by the kernel at a top-level call-boundary crossing
    /// (§4.1 "External-call-depth contract"), never mid-call.
    pub fn sync_reclaim(&self) -> usize {
        let mut inner = self.inner.lock().expect("proxy table lock poisoned");
        let mut reclaimed = 0;
        while let Some(id) = inner.pending_reclaim.pop_front() {
            if let Some(slot) = inner.slots.get_mut(id) {
                if slot.strong_count != 0 {
                    // Re-referenced after being queued; skip.
                    continue;
                }
                if let Some(mut obj) = slot.object.take() {
                    obj.finalize();
                }
                slot.generation = slot.generation.wrapping_add(1);
                inner.free_list.push_back(id);
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            tracing::debug!(reclaimed, "proxy table reclaim cycle");
        }
        reclaimed
    }

    /// Number of currently live (non-reclaimed) slots, for GC-root walking
    /// by the guest collector (§4.2 "GC cooperation"): the embedding kernel
    /// asks this table for the set of live handles to mark as roots.
    pub fn live_ids(&self) -> Vec<u32> {
        let inner = self.inner.lock().expect("proxy table lock poisoned");
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.object.is_some())
            .map(|(i, _)| i as u32)
            .collect()
    }
}

impl fmt::Debug for ProxyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().expect("proxy table lock poisoned");
        f.debug_struct("ProxyTable")
            .field("kind", &self.kind)
            .field("slots", &inner.slots.len())
            .field("free", &inner.free_list.len())
            .finish()
    }
}
