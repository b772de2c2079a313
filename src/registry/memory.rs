// src/registry/memory.rs

use super::{InstallRecord, Registry};
use crate::error::Result;
use std::collections::BTreeMap;

/// Registry kept entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    records: BTreeMap<String, InstallRecord>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for MemoryRegistry {
    fn get(&self, name: &str) -> Result<Option<InstallRecord>> {
        Ok(self.records.get(name).cloned())
    }

    fn set(&mut self, name: &str, record: InstallRecord) -> Result<()> {
        self.records.insert(name.to_string(), record);
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<Option<InstallRecord>> {
        Ok(self.records.remove(name))
    }

    fn list(&self) -> Result<Vec<(String, InstallRecord)>> {
        Ok(self
            .records
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect())
    }
}
