//! The host-held-by-guest proxy object (§4.2): wraps a single JS value so
//! guest code holding a proxy id can forward `get_attr`/`set_attr`/`call`
//! straight through to it. This is the "JsProxy pattern" object itself
//! (§4.2): `set_attr` on this type *is* the host-side twin-object
//! notification.
//!
//! Compiled two ways: on `wasm32` it wraps a real `wasm_bindgen::JsValue`;
//! off `wasm32` (native unit tests, `cargo test` on a dev machine) it
//! wraps an inert stand-in so the rest of the kernel can be exercised
//! without a JS engine. `cfg-if` keeps the two bodies from fighting over
//! the same `cfg` attribute in three places the way a plain `#[cfg]` pair
//! would.

use cpyhost_proxy::{ProxyError, ProxyObject, ProxyResult, Value};
use std::fmt;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        use js_sys::Reflect;
        use wasm_bindgen::JsValue;

        pub struct HostObject {
            inner: JsValue,
        }

        impl HostObject {
            pub fn new(inner: JsValue) -> Self {
                Self { inner }
            }

            pub fn js_value(&self) -> &JsValue {
                &self.inner
            }
        }

        impl fmt::Debug for HostObject {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct("HostObject").field("inner", &self.inner).finish()
            }
        }

        impl ProxyObject for HostObject {
            fn get_attr(&self, name: &str) -> ProxyResult<Value> {
                let raw = Reflect::get(&self.inner, &JsValue::from_str(name))
                    .map_err(|_| ProxyError::NoSuchAttribute { name: name.to_string() })?;
                Ok(js_value_to_value(&raw))
            }

            fn set_attr(&mut self, name: &str, value: Value) -> ProxyResult<()> {
                Reflect::set(&self.inner, &JsValue::from_str(name), &value_to_js_value(&value))
                    .map_err(|_| ProxyError::UnsupportedType { type_name: name.to_string() })?;
                Ok(())
            }

            fn call(&self, args: &[Value]) -> ProxyResult<Value> {
                let func: &js_sys::Function = self
                    .inner
                    .dyn_ref()
                    .ok_or_else(|| ProxyError::UnsupportedType { type_name: "not callable".to_string() })?;
                let js_args = js_sys::Array::new();
                for arg in args {
                    js_args.push(&value_to_js_value(arg));
                }
                let this = JsValue::NULL;
                let result = js_sys::Reflect::apply(func, &this, &js_args)
                    .map_err(|_| ProxyError::NoSuchAttribute { name: "<call threw>".to_string() })?;
                Ok(js_value_to_value(&result))
            }
        }

        fn js_value_to_value(raw: &JsValue) -> Value {
            if raw.is_null() || raw.is_undefined() {
                return Value::None;
            }
            if let Some(b) = raw.as_bool() {
                return Value::Bool(b);
            }
            if let Some(n) = raw.as_f64() {
                if n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 {
                    return Value::Int(n as i64);
                }
                return Value::Float(n);
            }
            if let Some(s) = raw.as_string() {
                return Value::Str(s);
            }
            // Composite/opaque types are re-proxied rather than copied
            // (§4.2 "conversion of unsupported type -> opaque proxy"); the
            // kernel's `convert_host_to_guest` owns allocating the id, not
            // this low-level conversion helper.
            Value::None
        }

        fn value_to_js_value(value: &Value) -> JsValue {
            match value {
                Value::None => JsValue::NULL,
                Value::Bool(b) => JsValue::from_bool(*b),
                Value::Int(i) => JsValue::from_f64(*i as f64),
                Value::Float(f) => JsValue::from_f64(*f),
                Value::Str(s) => JsValue::from_str(s),
                Value::Bytes(b) => js_sys::Uint8Array::from(b.as_slice()).into(),
                Value::Proxy { id, .. } | Value::ExceptionProxy { id, .. } => {
                    JsValue::from_f64(*id as f64)
                }
            }
        }

        use wasm_bindgen::JsCast;

        // SAFETY: same single-execution-context guarantee as
        // `GuestObject` (§5) — `wasm32` has no real threads, and the
        // kernel never touches the proxy tables from more than one
        // logical context at a time. `JsValue` is `!Send` only because
        // it is tied to a particular JS engine's thread-local heap,
        // which on `wasm32` is the only thread there is.
        unsafe impl Send for HostObject {}
    } else {
        /// Off-`wasm32`, a host object is whatever the embedding test
        /// harness wants it to be: a plain attribute/call table. Real
        /// hosts only ever run this crate as `wasm32`; this branch exists
        /// so `cpyhost`'s own test suite can exercise C1/C2 without a JS
        /// engine.
        #[derive(Debug, Default)]
        pub struct HostObject {
            attrs: std::collections::HashMap<String, Value>,
        }

        impl HostObject {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
                self.attrs.insert(name.into(), value);
                self
            }
        }

        impl ProxyObject for HostObject {
            fn get_attr(&self, name: &str) -> ProxyResult<Value> {
                self.attrs
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ProxyError::NoSuchAttribute { name: name.to_string() })
            }

            fn set_attr(&mut self, name: &str, value: Value) -> ProxyResult<()> {
                self.attrs.insert(name.to_string(), value);
                Ok(())
            }

            fn call(&self, args: &[Value]) -> ProxyResult<Value> {
                Ok(args.first().cloned().unwrap_or(Value::None))
            }
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn stub_host_object_forwards_attribute_writes() {
        let mut obj = HostObject::new().with_attr("enabled", Value::Bool(false));
        obj.set_attr("enabled", Value::Bool(true)).unwrap();
        assert_eq!(obj.get_attr("enabled").unwrap(), Value::Bool(true));
    }
}
