//! In-memory mocks for the sync ports

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use landfall_core::{CacheInvalidator, LandingRepository, LandingSource};
use landfall_domain::{ExternalLanding, LandfallError, MeteoriteLanding, Result as DomainResult};
use parking_lot::Mutex;

type Snapshot = Option<Vec<ExternalLanding>>;

/// Upstream that replays queued responses, then a steady snapshot.
#[derive(Default)]
pub struct ScriptedSource {
    queued: Mutex<VecDeque<DomainResult<Snapshot>>>,
    steady: Mutex<Snapshot>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(items: Vec<ExternalLanding>) -> Self {
        let source = Self::default();
        source.set_snapshot(items);
        source
    }

    /// Response returned whenever nothing is queued
    pub fn set_snapshot(&self, items: Vec<ExternalLanding>) {
        *self.steady.lock() = Some(items);
    }

    /// Make the steady response a JSON `null`
    pub fn set_null(&self) {
        *self.steady.lock() = None;
    }

    /// Queue `times` copies of `error` ahead of the steady snapshot
    pub fn fail_with(&self, error: LandfallError, times: usize) {
        let mut queued = self.queued.lock();
        for _ in 0..times {
            queued.push_back(Err(error.clone()));
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LandingSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> DomainResult<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.queued.lock().pop_front();
        match queued {
            Some(response) => response,
            None => Ok(self.steady.lock().clone()),
        }
    }
}

enum Staged {
    Insert(Vec<MeteoriteLanding>),
    Update(Vec<MeteoriteLanding>),
    Delete(Vec<MeteoriteLanding>),
}

/// Store that stages bulk operations and applies them atomically on commit.
#[derive(Default)]
pub struct InMemoryRepository {
    committed: Mutex<Vec<MeteoriteLanding>>,
    pending: Mutex<Vec<Staged>>,
    fail_commit: Mutex<bool>,
    commits: AtomicUsize,
    discards: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_commit(&self, fail: bool) {
        *self.fail_commit.lock() = fail;
    }

    pub fn records(&self) -> Vec<MeteoriteLanding> {
        self.committed.lock().clone()
    }

    pub fn find(&self, external_id: &str) -> Option<MeteoriteLanding> {
        self.committed.lock().iter().find(|r| r.external_id == external_id).cloned()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl LandingRepository for InMemoryRepository {
    async fn read_all(&self) -> DomainResult<Vec<MeteoriteLanding>> {
        Ok(self.records())
    }

    async fn bulk_insert(&self, records: &[MeteoriteLanding]) -> DomainResult<()> {
        self.pending.lock().push(Staged::Insert(records.to_vec()));
        Ok(())
    }

    async fn bulk_update(&self, records: &[MeteoriteLanding]) -> DomainResult<()> {
        self.pending.lock().push(Staged::Update(records.to_vec()));
        Ok(())
    }

    async fn bulk_delete(&self, records: &[MeteoriteLanding]) -> DomainResult<()> {
        self.pending.lock().push(Staged::Delete(records.to_vec()));
        Ok(())
    }

    async fn commit(&self) -> DomainResult<()> {
        if *self.fail_commit.lock() {
            return Err(LandfallError::Database("disk I/O error".into()));
        }

        let staged: Vec<Staged> = self.pending.lock().drain(..).collect();
        let mut committed = self.committed.lock();
        for op in staged {
            match op {
                Staged::Insert(records) => committed.extend(records),
                Staged::Update(records) => {
                    for record in records {
                        if let Some(slot) = committed.iter_mut().find(|r| r.id == record.id) {
                            *slot = record;
                        }
                    }
                }
                Staged::Delete(records) => {
                    committed.retain(|r| !records.iter().any(|d| d.id == r.id));
                }
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn discard_pending(&self) -> DomainResult<()> {
        self.pending.lock().clear();
        self.discards.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Invalidator that counts signals
#[derive(Default)]
pub struct CountingInvalidator {
    signals: AtomicUsize,
}

impl CountingInvalidator {
    pub fn count(&self) -> usize {
        self.signals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheInvalidator for CountingInvalidator {
    async fn invalidate_all(&self) {
        self.signals.fetch_add(1, Ordering::SeqCst);
    }
}
