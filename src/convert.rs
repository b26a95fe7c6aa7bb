//! Value conversion across the semihosting boundary (§4.2 "Value
//! conversion across the boundary ... must be total and preserve
//! identity"). The host-object direction lives in `host_object.rs`; this
//! module is the guest-object direction, the half that talks to
//! `rustpython_vm` directly.

use cpyhost_proxy::{ProxyKind, ProxyTable, Value};
use cpyhost_repl::ExceptionInfo;
use rustpython_vm::builtins::{PyBaseExceptionRef, PyBool, PyFloat, PyInt, PyStr};
use rustpython_vm::{Interpreter as PyInterpreter, PyObjectRef, VirtualMachine};
use std::rc::Rc;

/// Guest -> host (§4.2): small scalars pass by value; anything else is
/// proxied. Composite eager-copy types (dicts/lists/arrays) are policy the
/// kernel's higher-level marshaling applies before reaching this
/// function — by the time a value gets here it is either a scalar or
/// something that should become a proxy.
pub fn guest_to_host(
    vm: &VirtualMachine,
    interp: &Rc<PyInterpreter>,
    guest_table: &ProxyTable,
    obj: &PyObjectRef,
) -> Value {
    if vm.is_none(obj) {
        return Value::None;
    }
    if let Some(b) = obj.downcast_ref::<PyBool>() {
        return Value::Bool(b.as_bool());
    }
    if let Some(i) = obj.downcast_ref::<PyInt>() {
        if let Some(small) = i.as_bigint().to_i64() {
            return Value::Int(small);
        }
    }
    if let Some(f) = obj.downcast_ref::<PyFloat>() {
        return Value::Float(f.to_f64());
    }
    if let Some(s) = obj.downcast_ref::<PyStr>() {
        return Value::Str(s.as_str().to_string());
    }
    debug_assert_eq!(guest_table.kind(), ProxyKind::GuestHeld);
    let id = guest_table.add(Box::new(crate::guest_object::GuestObject::new(
        interp.clone(),
        guest_table.clone(),
        obj.clone(),
    )));
    Value::Proxy {
        id,
        kind: ProxyKind::GuestHeld,
    }
}

/// Host -> guest (§4.2). Proxy ids on the way in resolve against the
/// host-held table only at the point the kernel actually forwards a call
/// into the VM (e.g. `register_host_module`); this function handles the
/// scalar cases the interpreter itself needs to synthesize arguments.
pub fn host_to_guest(vm: &VirtualMachine, value: &Value) -> PyObjectRef {
    match value {
        Value::None => vm.ctx.none(),
        Value::Bool(b) => vm.ctx.new_bool(*b).into(),
        Value::Int(i) => vm.ctx.new_int(*i).into(),
        Value::Float(f) => vm.ctx.new_float(*f).into(),
        Value::Str(s) => vm.ctx.new_str(s.as_str()).into(),
        Value::Bytes(b) => vm.ctx.new_bytes(b.clone()).into(),
        // A proxy id crossing back into the guest (e.g. an argument that
        // is itself a previously-returned guest object) is resolved by
        // the kernel before calling here in the common path; as a
        // fallback, represent it as its raw id so round-tripping through
        // `Value` never panics.
        Value::Proxy { id, .. } | Value::ExceptionProxy { id, .. } => {
            vm.ctx.new_int(*id as i64).into()
        }
    }
}

/// Registers a raised guest exception as a guest-held proxy and returns
/// the `ExceptionInfo` the REPL/exec dispatch marshals into the output
/// triplet's exception slot (§4.5, §9 "Exceptions as values").
pub fn register_exception(
    vm: &VirtualMachine,
    interp: &Rc<PyInterpreter>,
    guest_table: &ProxyTable,
    exc: PyBaseExceptionRef,
) -> ExceptionInfo {
    let type_name = exc.class().name().to_string();
    let message = exception_message(vm, &exc);
    let obj: PyObjectRef = exc.into();
    let id = guest_table.add(Box::new(crate::guest_object::GuestObject::new(
        interp.clone(),
        guest_table.clone(),
        obj,
    )));
    ExceptionInfo::new(id, type_name, message)
}

fn exception_message(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> String {
    vm.to_str(&exc.clone().into())
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}

/// Synthesizes the exception the kernel raises on the guest's behalf for
/// an out-of-memory condition (§7 "Out of memory").
pub fn new_memory_error(vm: &VirtualMachine, detail: &str) -> PyBaseExceptionRef {
    vm.new_memory_error(detail.to_string())
}
