//! Task handles for cancellable long-running operations.
//!
//! Cross-module scans (occurrence finding, restructuring) can take
//! arbitrarily long. Callers hand them a [`TaskHandle`]; the operation
//! reports per-resource job boundaries through registered observers and
//! polls [`TaskHandle::check_stopped`] between resources. No in-flight
//! analysis is suspended mid-AST: cancellation only takes effect at
//! resource boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{HawserError, HawserResult};

/// Observer notified of job boundaries on a task.
pub trait JobObserver: Send {
    /// A per-resource job started.
    fn started_job(&mut self, name: &str);
    /// The current job finished.
    fn finished_job(&mut self);
}

/// Handle passed into long-running operations.
///
/// Cloning shares the underlying stop flag, so a UI thread can hold one
/// clone and stop the operation from outside while the scan holds another.
#[derive(Clone, Default)]
pub struct TaskHandle {
    stopped: Arc<AtomicBool>,
    observers: Arc<Mutex<Vec<Box<dyn JobObserver>>>>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl TaskHandle {
    /// Create a fresh, unstopped handle.
    pub fn new() -> Self {
        TaskHandle::default()
    }

    /// Request that the operation stop at the next resource boundary.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True if `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Fail with [`HawserError::Interrupted`] if the task was stopped.
    ///
    /// Operations call this between resources; already-produced results
    /// remain valid after an interrupt.
    pub fn check_stopped(&self) -> HawserResult<()> {
        if self.is_stopped() {
            return Err(HawserError::Interrupted);
        }
        Ok(())
    }

    /// Register an observer for job boundary events.
    pub fn add_observer(&self, observer: Box<dyn JobObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Report the start of a per-resource job.
    pub fn started_job(&self, name: &str) {
        for observer in self.observers.lock().unwrap().iter_mut() {
            observer.started_job(name);
        }
    }

    /// Report the end of the current job.
    pub fn finished_job(&self) {
        for observer in self.observers.lock().unwrap().iter_mut() {
            observer.finished_job();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
