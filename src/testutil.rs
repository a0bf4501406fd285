//! Test doubles for the service's collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{FetchError, NotifyError, StoreError};
use crate::fetcher::Fetcher;
use crate::notify::Notifier;
use crate::store::{MemoryStore, StateStore};
use crate::types::{AlertPayload, AlertState, CycleUpdate, Reading};

/// Returns queued readings in order. `None` entries, and an empty queue,
/// fail like a malformed feed body.
pub struct ScriptedFetcher {
    readings: Mutex<VecDeque<Option<Reading>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(readings: Vec<Option<Reading>>) -> Self {
        Self {
            readings: Mutex::new(readings.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<Reading, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.readings.lock().unwrap().pop_front().flatten();
        next.ok_or_else(|| FetchError::Malformed("scripted failure".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Alert(i64),
    Update { cycle: i64, alert: bool },
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    fail_next: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn record(&self, msg: Sent) -> Result<(), NotifyError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(NotifyError::Status(503));
        }
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    async fn send_alert(&self, alert: &AlertPayload) -> Result<(), NotifyError> {
        self.record(Sent::Alert(alert.cycle))
    }

    async fn send_cycle_update(&self, update: &CycleUpdate) -> Result<(), NotifyError> {
        self.record(Sent::Update {
            cycle: update.cycle,
            alert: update.alert,
        })
    }
}

/// `MemoryStore` whose saves can be made to fail like a full disk.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn new(defaults: AlertState) -> Self {
        Self {
            inner: MemoryStore::new(defaults),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl StateStore for FlakyStore {
    async fn load(&self, subject: &str) -> Result<AlertState, StoreError> {
        self.inner.load(subject).await
    }

    async fn save(&self, subject: &str, state: &AlertState) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(subject, state).await
    }
}
