//! Bidirectional object proxy (C2): two symmetric, reference-counted
//! registries mapping opaque integer ids to live objects on the other side
//! of the semihosting boundary. See `spec.md` §3 and §4.2.

pub mod error;
pub mod table;
pub mod value;

pub use error::{ProxyError, ProxyResult};
pub use table::{ProxyObject, ProxyTable};
pub use value::{kind_from_bit, ProxyKind, Tag, Triplet, Value};

/// Attribute lookup across the boundary (§4.2 "Attribute & call
/// forwarding"). Writes the result into the caller-provided triplet
/// convention by returning a `Value`; callers that speak the ABI directly
/// convert it with `Value::into` helpers in the kernel crate.
pub fn lookup_attr(table: &ProxyTable, id: u32, name: &str) -> ProxyResult<Value> {
    table.with(id, |obj| obj.get_attr(name))?
}

/// `store_attr` is how guest peripheral code pushes state to a host-side
/// "twin" object: this call *is* the notification (§4.2, the "JsProxy
/// pattern" — event delivery via property assignment rather than a
/// dedicated callback API).
pub fn store_attr(table: &ProxyTable, id: u32, name: &str, value: Value) -> ProxyResult<()> {
    table.with_mut(id, |obj| obj.set_attr(name, value))?
}

pub fn call(table: &ProxyTable, id: u32, args: &[Value]) -> ProxyResult<Value> {
    table.with(id, |obj| obj.call(args))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct MockObject {
        attrs: RefCell<HashMap<String, Value>>,
        finalized: RefCell<bool>,
    }

    impl ProxyObject for MockObject {
        fn get_attr(&self, name: &str) -> ProxyResult<Value> {
            self.attrs
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| ProxyError::NoSuchAttribute {
                    name: name.to_string(),
                })
        }

        fn set_attr(&mut self, name: &str, value: Value) -> ProxyResult<()> {
            self.attrs.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }

        fn call(&self, args: &[Value]) -> ProxyResult<Value> {
            Ok(args.first().cloned().unwrap_or(Value::None))
        }

        fn finalize(&mut self) {
            *self.finalized.borrow_mut() = true;
        }
    }

    #[test]
    fn proxy_stability_p2() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id = table.add(Box::new(MockObject::default()));
        assert!(table.with(id, |_| ()).is_ok());
        store_attr(&table, id, "x", Value::Int(7)).unwrap();
        assert!(table.with(id, |_| ()).is_ok());
    }

    #[test]
    fn proxy_recycle_safety_p3() {
        let table = ProxyTable::new(ProxyKind::GuestHeld);
        let id = table.add(Box::new(MockObject::default()));
        let gen_before = table.generation(id);
        table.release(id);
        table.sync_reclaim();
        assert!(table.check_generation(id, gen_before).is_err());

        let id2 = table.add(Box::new(MockObject::default()));
        // May or may not reuse the numeric id, but if it does the generation
        // must differ from the original.
        if id2 == id {
            assert_ne!(table.generation(id2), gen_before);
        }
    }

    #[test]
    fn attribute_forwarding_and_missing_attribute() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id = table.add(Box::new(MockObject::default()));
        store_attr(&table, id, "lastTransaction", Value::Int(42)).unwrap();
        assert_eq!(lookup_attr(&table, id, "lastTransaction").unwrap(), Value::Int(42));
        assert!(matches!(
            lookup_attr(&table, id, "nope"),
            Err(ProxyError::NoSuchAttribute { .. })
        ));
    }

    #[test]
    fn invalid_id_is_distinct_from_stale_reference() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        assert!(matches!(
            table.with(999, |_| ()),
            Err(ProxyError::InvalidId { id: 999 })
        ));
    }

    #[test]
    fn release_does_not_reclaim_while_still_referenced() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id = table.add(Box::new(MockObject::default()));
        table.add_ref(id); // now 2 strong refs
        table.release(id); // back to 1
        assert_eq!(table.reference_count(id), 1);
        assert!(table.with(id, |_| ()).is_ok());
    }

    #[test]
    fn call_forwarding() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id = table.add(Box::new(MockObject::default()));
        let result = call(&table, id, &[Value::Int(5)]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn root_id_zero_is_never_reclaimed() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        table.bind_root(Box::new(MockObject::default()));
        table.release(0);
        table.release(0);
        table.sync_reclaim();
        assert!(table.with(0, |_| ()).is_ok());
    }
}
