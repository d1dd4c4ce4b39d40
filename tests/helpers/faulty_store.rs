//! Fault injection for the persistence port
//!
//! `FaultyStore` wraps a `MemoryStore` and can:
//! - hide records from the next N single-record lookups (simulates a
//!   concurrent writer landing between lookup and insert)
//! - hide records from every lookup (winner never becomes visible)
//! - fail lookups or inserts with a given `StoreError`
//! - stall every call for a fixed duration
//! - hold the first N single-record lookups until all N have run, so every
//!   caller misses and then races on insert

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lidar_db::experiment::{Experiment, ExperimentId, Measurement, ProcessingResult};
use lidar_db::store::{CaptureStore, MemoryStore};
use lidar_db::{StoreError, StoreResult};
use tokio::sync::Barrier;

#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    hidden_lookups: AtomicUsize,
    hide_always: AtomicBool,
    find_error: Mutex<Option<StoreError>>,
    insert_error: Mutex<Option<StoreError>>,
    stall: Mutex<Option<Duration>>,
    insert_calls: AtomicUsize,
    lookup_gate: Mutex<Option<Arc<Barrier>>>,
    gated_lookups: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` single-record lookups report "not found".
    pub fn hide_next_lookups(&self, n: usize) {
        self.hidden_lookups.store(n, Ordering::SeqCst);
    }

    /// Every single-record lookup reports "not found".
    pub fn hide_all_lookups(&self) {
        self.hide_always.store(true, Ordering::SeqCst);
    }

    pub fn fail_finds_with(&self, error: StoreError) {
        *self.find_error.lock().unwrap() = Some(error);
    }

    pub fn fail_inserts_with(&self, error: StoreError) {
        *self.insert_error.lock().unwrap() = Some(error);
    }

    pub fn stall_for(&self, duration: Duration) {
        *self.stall.lock().unwrap() = Some(duration);
    }

    /// The next `callers` single-record lookups wait for each other before
    /// returning their (already computed) answer.
    pub fn gate_lookups(&self, callers: usize) {
        *self.lookup_gate.lock().unwrap() = Some(Arc::new(Barrier::new(callers)));
        self.gated_lookups.store(callers, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    async fn before_find(&self) -> StoreResult<()> {
        self.maybe_stall().await;
        let error = self.find_error.lock().unwrap().clone();
        error.map_or(Ok(()), Err)
    }

    async fn before_insert(&self) -> StoreResult<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        let error = self.insert_error.lock().unwrap().clone();
        error.map_or(Ok(()), Err)
    }

    async fn maybe_stall(&self) {
        let stall = *self.stall.lock().unwrap();
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }
    }

    async fn after_find(&self) {
        if self
            .gated_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return;
        }
        let gate = self.lookup_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
    }

    fn hidden(&self) -> bool {
        if self.hide_always.load(Ordering::SeqCst) {
            return true;
        }
        self.hidden_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl CaptureStore for FaultyStore {
    async fn find_experiment(
        &self,
        start_time: DateTime<Utc>,
        title: &str,
    ) -> StoreResult<Option<Experiment>> {
        self.before_find().await?;
        if self.hidden() {
            return Ok(None);
        }
        let found = self.inner.find_experiment(start_time, title).await;
        self.after_find().await;
        found
    }

    async fn find_experiments_by_start(
        &self,
        start_time: DateTime<Utc>,
    ) -> StoreResult<Vec<Experiment>> {
        self.before_find().await?;
        self.inner.find_experiments_by_start(start_time).await
    }

    async fn insert_experiment(&self, experiment: Experiment) -> StoreResult<Experiment> {
        self.before_insert().await?;
        self.inner.insert_experiment(experiment).await
    }

    async fn find_measurement(
        &self,
        experiment_id: ExperimentId,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
    ) -> StoreResult<Option<Measurement>> {
        self.before_find().await?;
        if self.hidden() {
            return Ok(None);
        }
        let found = self
            .inner
            .find_measurement(experiment_id, start_time, stop_time)
            .await;
        self.after_find().await;
        found
    }

    async fn insert_measurement(&self, measurement: Measurement) -> StoreResult<Measurement> {
        self.before_insert().await?;
        self.inner.insert_measurement(measurement).await
    }

    async fn find_all_measurements(
        &self,
        experiment_id: ExperimentId,
    ) -> StoreResult<Vec<Measurement>> {
        self.before_find().await?;
        self.inner.find_all_measurements(experiment_id).await
    }

    async fn find_processing_result(
        &self,
        experiment_id: ExperimentId,
    ) -> StoreResult<Option<ProcessingResult>> {
        self.before_find().await?;
        if self.hidden() {
            return Ok(None);
        }
        let found = self.inner.find_processing_result(experiment_id).await;
        self.after_find().await;
        found
    }

    async fn insert_processing_result(
        &self,
        result: ProcessingResult,
    ) -> StoreResult<ProcessingResult> {
        self.before_insert().await?;
        self.inner.insert_processing_result(result).await
    }
}
