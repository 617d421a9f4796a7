use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::KeyValueStore;

/// Non-durable store, used by tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
        values.remove(key);
        Ok(())
    }
}
