//! Background task runner for cache population and invalidation
//!
//! Tasks are fire-and-forget: once submitted they run to completion and cannot
//! be cancelled. A stale result is superseded by a later task overwriting it.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

pub type Task = BoxFuture<'static, ()>;

/// Runs work off the interactive path
pub trait TaskRunner: Send + Sync {
    fn submit(&self, label: String, task: Task);
}

/// Spawns each task on a tokio runtime
///
/// Several tasks may be in flight at once; there is no ordering between them.
#[derive(Debug)]
pub struct TokioTaskRunner {
    handle: Handle,
    outstanding: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioTaskRunner {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            outstanding: Mutex::new(Vec::new()),
        }
    }

    /// Runner on the runtime of the calling task
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn pending(&self) -> usize {
        let mut outstanding = self.outstanding.lock();
        outstanding.retain(|h| !h.is_finished());
        outstanding.len()
    }

    /// Wait until every submitted task, including ones submitted meanwhile, has finished
    pub async fn drain(&self) {
        loop {
            let batch = std::mem::take(&mut *self.outstanding.lock());
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(err) = handle.await {
                    warn!("background task failed: {}", err);
                }
            }
        }
    }
}

impl TaskRunner for TokioTaskRunner {
    fn submit(&self, label: String, task: Task) {
        debug!("submitting '{}'", label);
        let span = info_span!("task", label = %label);
        let handle = self.handle.spawn(task.instrument(span));

        let mut outstanding = self.outstanding.lock();
        outstanding.retain(|h| !h.is_finished());
        outstanding.push(handle);
    }
}
