//! Task queues and completion tracking
//!
//! Work is split across two unbounded MPMC channels: directory expansions and
//! file copies. Workers drain the file queue first so that a deep tree does not
//! pile up copy tasks while expansions keep producing more.
//!
//! Completion is tracked by a [`PendingCounter`] rather than by queue length:
//! a popped directory task is still "pending" until its children have been
//! enqueued, so the queues can be momentarily empty while work is alive.

use crate::core::{BackupJob, FileCopyTask};
use crossbeam::channel::{bounded, unbounded, Receiver, Select, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What woke an idle worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// A queue has a task ready
    Work,
    /// The run is shutting down
    Shutdown,
    /// The idle interval elapsed
    Timeout,
}

/// Directory and file queues plus the shutdown signal
pub struct TaskQueues {
    dir_tx: Sender<BackupJob>,
    dir_rx: Receiver<BackupJob>,
    file_tx: Sender<FileCopyTask>,
    file_rx: Receiver<FileCopyTask>,
    /// Never sent on; dropping it disconnects `shutdown_rx` and wakes every waiter
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
}

impl TaskQueues {
    /// Create empty queues
    pub fn new() -> Self {
        let (dir_tx, dir_rx) = unbounded();
        let (file_tx, file_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(0);

        Self {
            dir_tx,
            dir_rx,
            file_tx,
            file_rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
        }
    }

    /// Enqueue a directory task. Never blocks.
    pub fn push_dir(&self, job: BackupJob) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.dir_tx.send(job);
    }

    /// Enqueue a file copy task. Never blocks.
    pub fn push_file(&self, task: FileCopyTask) {
        let _ = self.file_tx.send(task);
    }

    /// Pop a directory task without blocking
    pub fn try_pop_dir(&self) -> Option<BackupJob> {
        self.dir_rx.try_recv().ok()
    }

    /// Pop a file copy task without blocking
    pub fn try_pop_file(&self) -> Option<FileCopyTask> {
        self.file_rx.try_recv().ok()
    }

    /// Queued directory tasks
    pub fn dir_len(&self) -> usize {
        self.dir_rx.len()
    }

    /// Queued file tasks
    pub fn file_len(&self) -> usize {
        self.file_rx.len()
    }

    /// Check if both queues are empty
    pub fn is_empty(&self) -> bool {
        self.dir_rx.is_empty() && self.file_rx.is_empty()
    }

    /// Block until a queue has a task, shutdown is signalled, or `timeout`
    /// elapses. Nothing is consumed; the caller pops in priority order.
    pub fn wait_for_work(&self, timeout: Duration) -> Wakeup {
        let mut sel = Select::new();
        let file_idx = sel.recv(&self.file_rx);
        let dir_idx = sel.recv(&self.dir_rx);
        let shutdown_idx = sel.recv(&self.shutdown_rx);

        match sel.ready_timeout(timeout) {
            Ok(i) if i == file_idx || i == dir_idx => Wakeup::Work,
            Ok(i) if i == shutdown_idx => Wakeup::Shutdown,
            Ok(_) => Wakeup::Work,
            Err(_) => Wakeup::Timeout,
        }
    }

    /// Wake every worker blocked in [`wait_for_work`](Self::wait_for_work),
    /// now and on every later call
    pub fn signal_shutdown(&self) {
        self.shutdown_tx.lock().take();
    }

    /// Has shutdown been signalled?
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_tx.lock().is_none()
    }
}

impl Default for TaskQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// Count of tasks enqueued but not yet completed
///
/// Incremented before a task is pushed and decremented only after the task's
/// side effects (including enqueuing its children) are done, so it reaches
/// zero exactly when the task graph is exhausted.
#[derive(Debug, Default)]
pub struct PendingCounter {
    count: AtomicUsize,
    lock: Mutex<()>,
    zero: Condvar,
}

impl PendingCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one new task
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Record `n` completed tasks
    pub fn decrement_by(&self, n: usize) {
        if n == 0 {
            return;
        }
        match self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(n))
        {
            Ok(previous) => {
                if previous == n {
                    // Taking the lock orders this notify after any waiter's
                    // check-then-wait.
                    let _guard = self.lock.lock();
                    self.zero.notify_all();
                }
            }
            Err(current) => {
                tracing::error!(
                    "Pending counter underflow: decrement by {} with only {} pending",
                    n,
                    current
                );
                debug_assert!(false, "pending counter underflow");
            }
        }
    }

    /// Current value
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Check if no work is outstanding
    pub fn is_zero(&self) -> bool {
        self.get() == 0
    }

    /// Wait for the counter to reach zero, for at most `timeout`.
    /// Returns true if it is zero.
    pub fn wait_until_zero(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        if self.is_zero() {
            return true;
        }
        self.zero.wait_for(&mut guard, timeout);
        self.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ExclusionSet;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn job(name: &str) -> BackupJob {
        BackupJob::root(PathBuf::from(name), PathBuf::from("/dst"), Arc::new(ExclusionSet::new()))
    }

    fn file(name: &str) -> FileCopyTask {
        FileCopyTask {
            source_path: PathBuf::from(name),
            dest_path: PathBuf::from("/dst").join(name),
        }
    }

    #[test]
    fn test_queues_are_fifo() {
        let queues = TaskQueues::new();
        queues.push_file(file("a"));
        queues.push_file(file("b"));
        queues.push_dir(job("/x"));

        assert_eq!(queues.file_len(), 2);
        assert_eq!(queues.dir_len(), 1);
        assert_eq!(queues.try_pop_file().unwrap().source_path, PathBuf::from("a"));
        assert_eq!(queues.try_pop_file().unwrap().source_path, PathBuf::from("b"));
        assert!(queues.try_pop_file().is_none());
        assert_eq!(queues.try_pop_dir().unwrap().source_dir, PathBuf::from("/x"));
        assert!(queues.is_empty());
    }

    #[test]
    fn test_wait_for_work_does_not_consume() {
        let queues = TaskQueues::new();
        queues.push_dir(job("/x"));

        assert_eq!(queues.wait_for_work(Duration::from_secs(5)), Wakeup::Work);
        assert_eq!(queues.dir_len(), 1);
    }

    #[test]
    fn test_wait_for_work_times_out() {
        let queues = TaskQueues::new();
        let start = Instant::now();
        assert_eq!(queues.wait_for_work(Duration::from_millis(30)), Wakeup::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_shutdown_wakes_waiters() {
        let queues = Arc::new(TaskQueues::new());
        let waiter = {
            let queues = Arc::clone(&queues);
            thread::spawn(move || queues.wait_for_work(Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(20));
        queues.signal_shutdown();

        assert_eq!(waiter.join().unwrap(), Wakeup::Shutdown);
        assert!(queues.is_shutdown());
        // Stays signalled
        assert_eq!(queues.wait_for_work(Duration::from_secs(30)), Wakeup::Shutdown);
    }

    #[test]
    fn test_push_wakes_waiter() {
        let queues = Arc::new(TaskQueues::new());
        let waiter = {
            let queues = Arc::clone(&queues);
            thread::spawn(move || queues.wait_for_work(Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(20));
        queues.push_file(file("a"));

        assert_eq!(waiter.join().unwrap(), Wakeup::Work);
    }

    #[test]
    fn test_pending_counter_basics() {
        let pending = PendingCounter::new();
        assert!(pending.is_zero());

        pending.increment();
        pending.increment();
        assert_eq!(pending.get(), 2);

        pending.decrement_by(1);
        assert!(!pending.is_zero());
        pending.decrement_by(1);
        assert!(pending.is_zero());
        assert!(pending.wait_until_zero(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_until_zero_times_out() {
        let pending = PendingCounter::new();
        pending.increment();
        assert!(!pending.wait_until_zero(Duration::from_millis(20)));
    }

    #[test]
    fn test_wait_until_zero_is_notified() {
        let pending = Arc::new(PendingCounter::new());
        for _ in 0..100 {
            pending.increment();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pending = Arc::clone(&pending);
                thread::spawn(move || {
                    for _ in 0..25 {
                        pending.decrement_by(1);
                    }
                })
            })
            .collect();

        let start = Instant::now();
        while !pending.wait_until_zero(Duration::from_secs(5)) {
            assert!(start.elapsed() < Duration::from_secs(30));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pending.get(), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "pending counter underflow")]
    fn test_underflow_is_a_logic_error() {
        let pending = PendingCounter::new();
        pending.decrement_by(1);
    }
}
