use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::models::ProcessData;

/// Finished results waiting to be shown. Each entry can be read exactly once,
/// and entries nobody reads expire with the retention window.
#[derive(Clone)]
pub struct PendingResults {
    entries: Arc<Mutex<HashMap<Uuid, (Instant, ProcessData)>>>,
    ttl: Duration,
}

impl PendingResults {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, (Instant, ProcessData)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, id: Uuid, data: ProcessData) {
        self.lock().insert(id, (Instant::now(), data));
    }

    /// Removes and returns the entry. A second call for the same id, an
    /// unknown id, or an expired entry yields `None`.
    pub fn take(&self, id: &str) -> Option<ProcessData> {
        let id = Uuid::parse_str(id.trim()).ok()?;
        let (stored_at, data) = self.lock().remove(&id)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(data)
    }

    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
