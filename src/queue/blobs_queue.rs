//! Bounded multi-producer multi-consumer queue of blob records
//!
//! A record is a fixed number of tensors written and read together. Writers
//! block while the queue is full, readers block while it is empty. Closing
//! the queue wakes everyone: writers fail immediately, readers drain what is
//! left and then fail.

use std::collections::{HashSet, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::error::{OpsError, OpsResult};
use crate::tensor::Tensor;

/// Names of live queues created with `enforce_unique_name`
static UNIQUE_QUEUE_NAMES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<Vec<Tensor>>,
    closed: bool,
}

#[derive(Debug)]
pub struct BlobsQueue {
    name: String,
    capacity: usize,
    num_blobs: usize,
    field_names: Vec<String>,
    unique_name: bool,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl BlobsQueue {
    /// # Arguments
    /// * `name` - Queue name, used in errors and for uniqueness
    /// * `capacity` - Maximum number of buffered records
    /// * `num_blobs` - Tensors per record
    /// * `enforce_unique_name` - Fail if another live queue uses `name`
    /// * `field_names` - Optional per-blob names, one per tensor of a record
    pub fn new(
        name: &str,
        capacity: usize,
        num_blobs: usize,
        enforce_unique_name: bool,
        field_names: Vec<String>,
    ) -> OpsResult<Self> {
        if capacity == 0 {
            return Err(OpsError::InvalidArgument(format!(
                "queue {}: capacity must be positive",
                name
            )));
        }
        if num_blobs == 0 {
            return Err(OpsError::InvalidArgument(format!(
                "queue {}: num_blobs must be positive",
                name
            )));
        }
        if !field_names.is_empty() && field_names.len() != num_blobs {
            return Err(OpsError::InvalidArgument(format!(
                "queue {}: {} field names for {} blobs",
                name,
                field_names.len(),
                num_blobs
            )));
        }
        if enforce_unique_name {
            let mut names = UNIQUE_QUEUE_NAMES.lock()?;
            if !names.insert(name.to_string()) {
                return Err(OpsError::InvalidArgument(format!(
                    "queue name {} already in use",
                    name
                )));
            }
        }

        tracing::debug!(queue = name, capacity, num_blobs, "blobs queue created");
        Ok(BlobsQueue {
            name: name.to_string(),
            capacity,
            num_blobs,
            field_names,
            unique_name: enforce_unique_name,
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_blobs(&self) -> usize {
        self.num_blobs
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    /// Append one record, waiting for room. Fails with `QueueClosed` once
    /// the queue is closed.
    pub fn blocking_write(&self, record: Vec<Tensor>) -> OpsResult<()> {
        self.check_arity(record.len())?;
        let mut state = self.state.lock()?;
        while !state.closed && state.records.len() >= self.capacity {
            state = self.not_full.wait(state)?;
        }
        if state.closed {
            return Err(OpsError::QueueClosed(self.name.clone()));
        }
        state.records.push_back(record);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the oldest record, waiting at most `timeout` (forever if `None`).
    ///
    /// Records written before `close` are still delivered; after that reads
    /// fail with `QueueClosed`.
    pub fn blocking_read(&self, timeout: Option<Duration>) -> OpsResult<Vec<Tensor>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock()?;
        loop {
            if let Some(record) = state.records.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(record);
            }
            if state.closed {
                return Err(OpsError::QueueClosed(self.name.clone()));
            }
            match deadline {
                None => state = self.not_empty.wait(state)?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(OpsError::QueueTimeout(self.name.clone()));
                    }
                    let (guard, _) = self.not_empty.wait_timeout(state, deadline - now)?;
                    state = guard;
                }
            }
        }
    }

    pub fn close(&self) -> OpsResult<()> {
        let mut state = self.state.lock()?;
        state.closed = true;
        drop(state);
        tracing::debug!(queue = %self.name, "blobs queue closed");
        self.not_empty.notify_all();
        self.not_full.notify_all();
        Ok(())
    }

    fn check_arity(&self, n: usize) -> OpsResult<()> {
        if n != self.num_blobs {
            return Err(OpsError::ShapeMismatch(format!(
                "queue {} holds records of {} blobs, got {}",
                self.name, self.num_blobs, n
            )));
        }
        Ok(())
    }
}

impl Drop for BlobsQueue {
    fn drop(&mut self) {
        if self.unique_name {
            if let Ok(mut names) = UNIQUE_QUEUE_NAMES.lock() {
                names.remove(&self.name);
            }
        }
    }
}
