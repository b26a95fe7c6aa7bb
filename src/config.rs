//! Init-time configuration (§6 "Configuration at init"), grounded in
//! `neo-config`'s plain `serde`-derived settings struct with module-level
//! `pub const` defaults rather than a builder type.

use serde::{Deserialize, Serialize};

pub mod constants {
    /// §6 "pystack_words: default ~2048".
    pub const DEFAULT_PYSTACK_WORDS: u32 = 2048;
    /// §6 "heap_bytes: default ~1 MiB".
    pub const DEFAULT_HEAP_BYTES: u32 = 1024 * 1024;
    /// §4.1 board bring-up default; arbitrary but stable across a session.
    pub const DEFAULT_CPU_FREQ_HZ: u32 = 48_000_000;
}

/// §6 "filesystem: {none, in-memory, persistent}".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilesystemBackend {
    None,
    InMemory,
    Persistent,
}

impl Default for FilesystemBackend {
    fn default() -> Self {
        FilesystemBackend::None
    }
}

/// The full set of options the host may pass to `init`/`init_with_heap`
/// (§6 "Configuration at init"). Constructed host-side as JSON and
/// deserialized here so adding a field is a one-line change on both sides,
/// the pattern `neo-config` uses for its own node settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pystack_words: u32,
    pub heap_bytes: u32,
    /// §6 "a `linebuffer=false` flag switches to per-character" output.
    pub linebuffer: bool,
    pub filesystem: FilesystemBackend,
    pub verbose: bool,
    /// §6 "autorun: bool (runs boot file then main file if present)".
    pub autorun: bool,
    /// §4.1 "sys.path initialized with a root-relative `\"\"` entry and
    /// any colon-separated default paths". Already split; the host is not
    /// expected to pass a colon-joined string across the boundary.
    pub default_sys_path: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pystack_words: constants::DEFAULT_PYSTACK_WORDS,
            heap_bytes: constants::DEFAULT_HEAP_BYTES,
            linebuffer: true,
            filesystem: FilesystemBackend::None,
            verbose: false,
            autorun: false,
            default_sys_path: Vec::new(),
        }
    }
}

impl Config {
    /// Parses the JSON blob the host passes to `init` (§6). Unknown
    /// fields are ignored rather than rejected, so older hosts calling a
    /// newer core don't need to be rebuilt in lockstep.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = Config::default();
        assert_eq!(cfg.pystack_words, 2048);
        assert_eq!(cfg.heap_bytes, 1024 * 1024);
        assert_eq!(cfg.filesystem, FilesystemBackend::None);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let cfg = Config::from_json(r#"{"heap_bytes": 2097152, "verbose": true}"#).unwrap();
        assert_eq!(cfg.heap_bytes, 2_097_152);
        assert!(cfg.verbose);
        assert_eq!(cfg.pystack_words, constants::DEFAULT_PYSTACK_WORDS);
    }
}
