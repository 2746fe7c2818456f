use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::category::RegoObjectCategory;
use crate::errors::RefreshError;

#[derive(Clone, Default)]
pub struct RefreshMetrics {
    inner: Arc<RefreshMetricsInner>,
}

#[derive(Default)]
struct RefreshMetricsInner {
    cycles_started: AtomicU64,
    cycles_succeeded: AtomicU64,
    cycles_failed: AtomicU64,
    last_generation: AtomicU64,
    last_error: Mutex<Option<RefreshError>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RefreshMetricsSnapshot {
    pub cycles_started: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub last_generation: u64,
    pub last_failed_category: Option<RegoObjectCategory>,
}

impl RefreshMetrics {
    pub fn record_cycle_started(&self) {
        self.inner.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_succeeded(&self, generation: u64) {
        self.inner.cycles_succeeded.fetch_add(1, Ordering::Relaxed);
        self.inner
            .last_generation
            .store(generation, Ordering::Relaxed);
    }

    pub fn record_cycle_failed(&self, err: &RefreshError) {
        self.inner.cycles_failed.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_error.lock() = Some(err.clone());
    }

    pub fn cycles_started(&self) -> u64 {
        self.inner.cycles_started.load(Ordering::Relaxed)
    }

    pub fn cycles_succeeded(&self) -> u64 {
        self.inner.cycles_succeeded.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.inner.cycles_failed.load(Ordering::Relaxed)
    }

    /// Cycles that ran to an outcome, successful or not.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_succeeded() + self.cycles_failed()
    }

    pub fn last_error(&self) -> Option<RefreshError> {
        self.inner.last_error.lock().clone()
    }

    pub fn snapshot(&self) -> RefreshMetricsSnapshot {
        RefreshMetricsSnapshot {
            cycles_started: self.cycles_started(),
            cycles_succeeded: self.cycles_succeeded(),
            cycles_failed: self.cycles_failed(),
            last_generation: self.inner.last_generation.load(Ordering::Relaxed),
            last_failed_category: self.inner.last_error.lock().as_ref().map(|err| err.category),
        }
    }
}
