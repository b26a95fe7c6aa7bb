//! The guest-held-by-host proxy object (§4.2): wraps a single
//! `rustpython_vm::PyObjectRef` so host code holding a proxy id can
//! forward attribute/call access into the embedded interpreter.
//!
//! `rustpython_vm::Interpreter::enter` takes `&self`, so every operation
//! here re-enters the VM rather than holding a `VirtualMachine` reference
//! across calls — the same per-call re-entry the official RustPython WASM
//! demo (`rustpython_wasm`) uses, since a `VirtualMachine` borrow can't
//! outlive the closure that produced it.

use crate::convert;
use cpyhost_proxy::{ProxyError, ProxyObject, ProxyResult, ProxyTable, Value};
use rustpython_vm::{Interpreter as PyInterpreter, PyObjectRef};
use std::fmt;
use std::rc::Rc;

pub struct GuestObject {
    interp: Rc<PyInterpreter>,
    /// The guest-held table this object itself lives in, passed through
    /// so nested conversions (an attribute that is itself a composite
    /// object) can mint further proxy ids without a global singleton.
    guest_table: ProxyTable,
    object: PyObjectRef,
}

impl GuestObject {
    pub fn new(interp: Rc<PyInterpreter>, guest_table: ProxyTable, object: PyObjectRef) -> Self {
        Self {
            interp,
            guest_table,
            object,
        }
    }

    pub fn object(&self) -> &PyObjectRef {
        &self.object
    }
}

impl fmt::Debug for GuestObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestObject")
            .field("object", &self.object.class().name().to_string())
            .finish()
    }
}

impl ProxyObject for GuestObject {
    fn get_attr(&self, name: &str) -> ProxyResult<Value> {
        self.interp.enter(|vm| {
            let attr = self
                .object
                .get_attr(name, vm)
                .map_err(|_| ProxyError::NoSuchAttribute {
                    name: name.to_string(),
                })?;
            Ok(convert::guest_to_host(
                vm,
                &self.interp,
                &self.guest_table,
                &attr,
            ))
        })
    }

    fn set_attr(&mut self, name: &str, value: Value) -> ProxyResult<()> {
        self.interp.enter(|vm| {
            let py_value = convert::host_to_guest(vm, &value);
            self.object
                .set_attr(name, py_value, vm)
                .map_err(|_| ProxyError::NoSuchAttribute {
                    name: name.to_string(),
                })
        })
    }

    fn call(&self, args: &[Value]) -> ProxyResult<Value> {
        self.interp.enter(|vm| {
            let py_args: Vec<_> = args.iter().map(|v| convert::host_to_guest(vm, v)).collect();
            match self.object.call(py_args, vm) {
                Ok(result) => Ok(convert::guest_to_host(
                    vm,
                    &self.interp,
                    &self.guest_table,
                    &result,
                )),
                Err(exc) => {
                    let info = convert::register_exception(vm, &self.interp, &self.guest_table, exc);
                    Err(ProxyError::Raised {
                        exception_id: info.proxy_id,
                    })
                }
            }
        })
    }
}

// §9 "Cyclic object graphs ... Finalizers must tolerate being called from
// the other side's collector": the default no-op `finalize` applies here.
// Dropping the `PyObjectRef` just releases the guest's own refcount; the
// interpreter's own GC reclaims it on its own schedule.

// SAFETY: the kernel enforces §5's single-execution-context guarantee —
// there is never more than one thread touching the guest interpreter, so
// `PyObjectRef`'s non-atomic refcounting is never raced. `ProxyObject`
// requires `Send` only because the same generic `ProxyTable` also holds
// `wasm_bindgen::JsValue` host objects, which are `!Send` for the same
// reason and under the same single-thread guarantee.
unsafe impl Send for GuestObject {}
