//! Module Registry & VFS Attach (C6, §4.6).
//!
//! Grounded on `neo-smart-contract`'s `InteropRegistry` pattern (a name ->
//! handler table consulted by the VM at call time, populated once at
//! startup and otherwise read-only): here the table maps an interned
//! module name to a host object's proxy id instead of a native function
//! pointer, and it is consulted by `import`, not by a syscall dispatcher.

use crate::error::{ReplError, ReplResult};
use bitflags::bitflags;
use cpyhost_proxy::{ProxyKind, ProxyTable};
use std::collections::HashMap;

bitflags! {
    /// The eight operations a VFS mount object must support (§4.6 "The
    /// mount interface requires the following capabilities").
    #[derive(Default)]
    pub struct Capabilities: u8 {
        const STAT    = 0b0000_0001;
        const OPEN    = 0b0000_0010;
        const READ    = 0b0000_0100;
        const WRITE   = 0b0000_1000;
        const LISTDIR = 0b0001_0000;
        const MKDIR   = 0b0010_0000;
        const UNLINK  = 0b0100_0000;
        const RENAME  = 0b1000_0000;
    }
}

/// The path entry under which files visible via the mounted VFS are
/// importable (§4.6 "visible to `import` via the path entry `/lib`").
pub const VFS_IMPORT_PATH: &str = "/lib";

#[derive(Debug, Clone, Copy)]
pub struct VfsMount {
    pub proxy_id: u32,
    pub capabilities: Capabilities,
}

/// Deferred registration of host-provided modules, plus the single VFS
/// mount slot. One instance per kernel (§3 "Module registry": "unordered
/// mapping from module name... written only during bootstrap or explicit
/// registration").
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, u32>,
    vfs: Option<VfsMount>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// §4.1 `register_host_module`: validates the id resolves in the
    /// host-held proxy table before recording anything ("invalid id ->
    /// error value", no partial state). Multiple registrations for the
    /// same name overwrite (§4.6).
    pub fn register_host_module(
        &mut self,
        host_table: &ProxyTable,
        name: &str,
        proxy_id: u32,
    ) -> ReplResult<()> {
        debug_assert_eq!(host_table.kind(), ProxyKind::HostHeld);
        host_table
            .with(proxy_id, |_| ())
            .map_err(|_| ReplError::InvalidModuleRef { id: proxy_id })?;
        self.modules.insert(name.to_string(), proxy_id);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.modules.get(name).copied()
    }

    /// §4.6 "VFS attach": the mount happens after VM init but before any
    /// user code runs (enforced by the kernel's init ordering, not here);
    /// this only validates the id and the capability set.
    pub fn attach_vfs(
        &mut self,
        host_table: &ProxyTable,
        proxy_id: u32,
        capabilities: Capabilities,
    ) -> ReplResult<()> {
        host_table
            .with(proxy_id, |_| ())
            .map_err(|_| ReplError::InvalidModuleRef { id: proxy_id })?;
        if !capabilities.contains(Capabilities::all()) {
            return Err(ReplError::MissingCapability {
                capability: "stat+open+read+write+listdir+mkdir+unlink+rename",
            });
        }
        self.vfs = Some(VfsMount {
            proxy_id,
            capabilities,
        });
        Ok(())
    }

    pub fn vfs_mount(&self) -> Option<VfsMount> {
        self.vfs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpyhost_proxy::table::ProxyObject;
    use cpyhost_proxy::{ProxyResult, Value};

    #[derive(Debug, Default)]
    struct Stub;
    impl ProxyObject for Stub {
        fn get_attr(&self, _name: &str) -> ProxyResult<Value> {
            Ok(Value::None)
        }
        fn set_attr(&mut self, _name: &str, _value: Value) -> ProxyResult<()> {
            Ok(())
        }
        fn call(&self, _args: &[Value]) -> ProxyResult<Value> {
            Ok(Value::None)
        }
    }

    #[test]
    fn register_then_lookup() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id = table.add(Box::new(Stub));
        let mut registry = ModuleRegistry::new();
        registry
            .register_host_module(&table, "board", id)
            .unwrap();
        assert_eq!(registry.lookup("board"), Some(id));
    }

    #[test]
    fn register_rejects_invalid_id() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let mut registry = ModuleRegistry::new();
        let err = registry.register_host_module(&table, "board", 999).unwrap_err();
        assert!(matches!(err, ReplError::InvalidModuleRef { id: 999 }));
        assert_eq!(registry.lookup("board"), None);
    }

    #[test]
    fn overwriting_a_registration_replaces_it() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id1 = table.add(Box::new(Stub));
        let id2 = table.add(Box::new(Stub));
        let mut registry = ModuleRegistry::new();
        registry.register_host_module(&table, "board", id1).unwrap();
        registry.register_host_module(&table, "board", id2).unwrap();
        assert_eq!(registry.lookup("board"), Some(id2));
    }

    #[test]
    fn vfs_attach_requires_full_capability_set() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id = table.add(Box::new(Stub));
        let mut registry = ModuleRegistry::new();
        let partial = Capabilities::STAT | Capabilities::READ;
        let err = registry.attach_vfs(&table, id, partial).unwrap_err();
        assert!(matches!(err, ReplError::MissingCapability { .. }));
        assert!(registry.vfs_mount().is_none());
    }

    #[test]
    fn vfs_attach_succeeds_with_full_capability_set() {
        let table = ProxyTable::new(ProxyKind::HostHeld);
        let id = table.add(Box::new(Stub));
        let mut registry = ModuleRegistry::new();
        registry.attach_vfs(&table, id, Capabilities::all()).unwrap();
        let mount = registry.vfs_mount().unwrap();
        assert_eq!(mount.proxy_id, id);
    }
}
