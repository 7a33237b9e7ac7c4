use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::pipeline::cancellation::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Submits work to an [`InferenceWorker`] with at most one job in flight.
pub struct Dispatcher<T> {
    inbox: Sender<T>,
    busy: Arc<AtomicBool>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
            busy: Arc::clone(&self.busy),
        }
    }
}

impl<T> Dispatcher<T> {
    /// Hands `job` to the worker unless one is already queued or running.
    ///
    /// Returns `false` when the job was dropped.
    pub fn try_submit(&self, job: T) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.inbox.try_send(job).is_err() {
            self.busy.store(false, Ordering::Release);
            return false;
        }
        true
    }
}

/// Clears the busy flag when a job ends, however it ends.
struct IdleOnDrop<'a>(&'a AtomicBool);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A dedicated thread that runs one collaborator call at a time.
pub struct InferenceWorker {
    name: String,
    busy: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Spawns the worker thread. `run` is called once per accepted job.
    ///
    /// The thread exits when every [`Dispatcher`] is dropped or `cancel`
    /// fires. A job already running when `cancel` fires completes normally.
    pub fn spawn<T, F>(
        name: &str,
        cancel: CancellationToken,
        mut run: F,
    ) -> std::io::Result<(Self, Dispatcher<T>)>
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let (inbox, jobs) = crossbeam_channel::bounded::<T>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let thread_busy = Arc::clone(&busy);
        let thread_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match jobs.recv_timeout(POLL_INTERVAL) {
                    Ok(job) => {
                        let _idle = IdleOnDrop(&thread_busy);
                        if cancel.is_cancelled() {
                            continue;
                        }
                        if panic::catch_unwind(AssertUnwindSafe(|| run(job))).is_err() {
                            log::error!("{thread_name} job panicked");
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        let worker = Self {
            name: name.to_string(),
            busy: Arc::clone(&busy),
            handle: Some(handle),
        };
        Ok((worker, Dispatcher { inbox, busy }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Waits for the thread to exit. Idempotent.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("{} worker panicked", self.name);
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.join();
    }
}
