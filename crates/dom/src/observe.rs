//! Child-list observers and their pending queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rne_core_types::{ChangeBatch, ChangeNotice, ChangeRecord, NodeId, ObserveScope, ObserverId};
use tokio::sync::Notify;

#[derive(Clone, Copy, Debug)]
pub(crate) struct ObserverEntry {
    pub target: NodeId,
    pub scope: ObserveScope,
}

pub(crate) struct ObserverTable {
    entries: DashMap<ObserverId, ObserverEntry>,
    pending: Mutex<Vec<(ObserverId, ChangeRecord)>>,
    next_id: AtomicU64,
    signal: Arc<Notify>,
}

impl ObserverTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            pending: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            signal: Arc::new(Notify::new()),
        }
    }

    pub fn attach(&self, target: NodeId, scope: ObserveScope) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(id, ObserverEntry { target, scope });
        id
    }

    pub fn detach(&self, observer: ObserverId) -> bool {
        let removed = self.entries.remove(&observer).is_some();
        if removed {
            self.pending.lock().retain(|(id, _)| *id != observer);
        }
        removed
    }

    pub fn is_active(&self, observer: ObserverId) -> bool {
        self.entries.contains_key(&observer)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot sorted by id so records for one mutation queue in a stable order.
    pub fn snapshot(&self) -> Vec<(ObserverId, ObserverEntry)> {
        let mut entries: Vec<(ObserverId, ObserverEntry)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn enqueue(&self, records: Vec<(ObserverId, ChangeRecord)>) {
        if records.is_empty() {
            return;
        }
        self.pending.lock().extend(records);
        self.signal.notify_one();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Groups pending records per observer, ordered by each observer's first record.
    pub fn drain(&self) -> Vec<ChangeNotice> {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut notices: Vec<ChangeNotice> = Vec::new();
        for (observer, record) in pending {
            match notices.iter_mut().find(|notice| notice.observer == observer) {
                Some(notice) => notice.batch.push(record),
                None => notices.push(ChangeNotice {
                    observer,
                    batch: ChangeBatch::single(record),
                }),
            }
        }
        notices
    }

    pub fn signal(&self) -> Arc<Notify> {
        Arc::clone(&self.signal)
    }
}
