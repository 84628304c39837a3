//! Key session cache
//!
//! A loaded key is represented by an opaque `keyId` the agent hands out
//! after the user enters the container password. The id stays valid only
//! until the agent invalidates it, so consumers treat "use fails" as
//! "reload the key". The store is injectable so tests can seed and inspect
//! it directly.

use dashmap::DashMap;

/// Session-scoped `serial number -> keyId` store.
pub trait KeySessionStore: Send + Sync {
    fn get(&self, serial_number: &str) -> Option<String>;
    fn set(&self, serial_number: &str, key_id: &str);
    fn clear(&self, serial_number: &str);
}

/// In-memory store, cleared with the process (the browser equivalent
/// cleared on page reload).
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySessionStore for MemorySessionStore {
    fn get(&self, serial_number: &str) -> Option<String> {
        self.entries.get(serial_number).map(|entry| entry.value().clone())
    }

    fn set(&self, serial_number: &str, key_id: &str) {
        self.entries
            .insert(serial_number.to_string(), key_id.to_string());
    }

    fn clear(&self, serial_number: &str) {
        self.entries.remove(serial_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("s-1"), None);

        store.set("s-1", "key-a");
        assert_eq!(store.get("s-1").as_deref(), Some("key-a"));

        store.set("s-1", "key-b");
        assert_eq!(store.get("s-1").as_deref(), Some("key-b"));

        store.clear("s-1");
        assert_eq!(store.get("s-1"), None);
    }
}
