//! Emulated HIP stream
//!
//! An ordered queue of device work drained by one worker thread. Launches
//! return as soon as the job is queued; `synchronize` blocks until every job
//! issued before it has finished. A job that fails or panics leaves a sticky
//! fault on the stream, the same way an illegal address does on real hardware.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::backend::hip_backend::error::{HipError, HipResult};

/// A unit of device work
pub type StreamJob = Box<dyn FnOnce() -> HipResult<()> + Send + 'static>;

enum Command {
    Run { name: String, job: StreamJob },
    Fence(mpsc::Sender<()>),
}

static NEXT_STREAM_ID: AtomicUsize = AtomicUsize::new(0);

/// HIP stream wrapper
pub struct HipStream {
    id: usize,
    sender: Option<mpsc::Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    fault: Arc<Mutex<Option<HipError>>>,
}

impl std::fmt::Debug for HipStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HipStream")
            .field("id", &self.id)
            .field("faulted", &self.is_faulted())
            .finish()
    }
}

impl HipStream {
    /// Create a new HIP stream
    pub fn new() -> HipResult<Self> {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel::<Command>();
        let fault: Arc<Mutex<Option<HipError>>> = Arc::new(Mutex::new(None));
        let worker_fault = Arc::clone(&fault);

        let worker = std::thread::Builder::new()
            .name(format!("hip-stream-{}", id))
            .spawn(move || run_worker(id, receiver, worker_fault))
            .map_err(|e| {
                HipError::InitializationFailed(format!("Failed to create HIP stream: {}", e))
            })?;

        tracing::debug!(stream = id, "HIP stream created");
        Ok(HipStream {
            id,
            sender: Some(sender),
            worker: Some(worker),
            fault,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Queue a job behind all previously issued work.
    ///
    /// Fails without queueing if the stream already holds a sticky fault.
    pub fn launch(&self, name: &str, job: StreamJob) -> HipResult<()> {
        self.check_fault()?;
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| HipError::DeviceError("HIP stream has been destroyed".to_string()))?;
        sender
            .send(Command::Run {
                name: name.to_string(),
                job,
            })
            .map_err(|_| HipError::DeviceError(format!("HIP stream {} worker exited", self.id)))
    }

    /// Synchronize the stream
    pub fn synchronize(&self) -> HipResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| HipError::DeviceError("HIP stream has been destroyed".to_string()))?;
        let (done_tx, done_rx) = mpsc::channel();
        sender
            .send(Command::Fence(done_tx))
            .map_err(|_| HipError::DeviceError(format!("HIP stream {} worker exited", self.id)))?;
        done_rx.recv().map_err(|_| {
            HipError::DeviceError(format!(
                "Stream synchronization failed: stream {} worker exited",
                self.id
            ))
        })?;
        self.check_fault()
    }

    /// Non-blocking fault query
    pub fn is_faulted(&self) -> bool {
        self.fault.lock().map(|f| f.is_some()).unwrap_or(true)
    }

    fn check_fault(&self) -> HipResult<()> {
        match self.fault.lock()?.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn run_worker(id: usize, receiver: mpsc::Receiver<Command>, fault: Arc<Mutex<Option<HipError>>>) {
    for command in receiver {
        match command {
            Command::Fence(done) => {
                let _ = done.send(());
            }
            Command::Run { name, job } => {
                let faulted = fault.lock().map(|f| f.is_some()).unwrap_or(true);
                if faulted {
                    tracing::debug!(stream = id, kernel = %name, "skipping kernel on faulted stream");
                    continue;
                }
                let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
                    Ok(result) => result,
                    Err(payload) => Err(HipError::MemoryAccessFault(format!(
                        "kernel '{}' aborted: {}",
                        name,
                        panic_message(payload.as_ref())
                    ))),
                };
                if let Err(err) = outcome {
                    let err = if err.is_sticky() {
                        err
                    } else {
                        HipError::DeviceError(format!("kernel '{}' failed: {}", name, err))
                    };
                    tracing::warn!(stream = id, kernel = %name, error = %err, "sticky fault recorded");
                    if let Ok(mut slot) = fault.lock() {
                        slot.get_or_insert(err);
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Drop for HipStream {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
