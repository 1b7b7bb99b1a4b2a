//! Task spawning with a shared shutdown signal.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

/// Create a linked trigger/signal pair. Dropping the trigger also cancels.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Fires the process-wide shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Cloneable view of the shutdown state, observed by every long-running task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // A dropped trigger counts as cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Spawns tasks and keeps their handles so shutdown can join them.
#[derive(Clone)]
pub struct TaskExecutor {
    tasks: Arc<Mutex<JoinSet<()>>>,
    spawned: Arc<AtomicUsize>,
    shutdown: Shutdown,
}

impl TaskExecutor {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            spawned: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }

    /// The signal every task spawned here should observe.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawn `future` on the current runtime. The future owns everything it
    /// captures; nothing is borrowed from the caller's loop.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            future.await;
            trace!(task = name, "task finished");
        });
        self.spawned.fetch_add(1, Ordering::Relaxed);
        trace!(task = name, active = tasks.len(), "task spawned");
    }

    /// Total number of tasks spawned over the executor's lifetime.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Number of tasks that have not been reaped yet.
    pub fn active(&self) -> usize {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait for every spawned task to finish, aborting whatever is still
    /// running after `grace`. Returns the number of aborted tasks.
    pub async fn join(&self, grace: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0;
        loop {
            let mut set = std::mem::take(&mut *self.lock());
            if set.is_empty() {
                break;
            }
            debug!(count = set.len(), "joining tasks");
            let drained = tokio::time::timeout_at(deadline, async {
                while set.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                aborted += set.len();
                warn!(count = set.len(), "tasks still running after grace period, aborting");
                set.abort_all();
                while set.join_next().await.is_some() {}
            }
        }
        aborted
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
