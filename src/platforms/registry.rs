use std::collections::HashMap;

use super::traits::PlatformAdapter;
use super::Platform;

/// Registry of configured platform adapters.
#[derive(Default)]
pub struct PlatformRegistry {
    adapters: HashMap<Platform, Box<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Box<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn PlatformAdapter> {
        self.adapters.get(&platform).map(|a| a.as_ref())
    }

    pub fn list(&self) -> Vec<Platform> {
        self.adapters.keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.adapters.len()
    }
}
