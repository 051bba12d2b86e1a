use std::collections::HashSet;
use std::sync::Mutex;

/// Dataset ids whose metadata has already been claimed for syncing in this run
#[derive(Debug, Default)]
pub struct DedupRegistry {
    claimed: Mutex<HashSet<String>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per id for the lifetime of the registry
    pub fn claim(&self, dataset_id: &str) -> bool {
        let mut claimed = self.claimed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.insert(dataset_id.to_string())
    }

    pub fn is_claimed(&self, dataset_id: &str) -> bool {
        let claimed = self.claimed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.contains(dataset_id)
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
