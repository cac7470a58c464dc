//! Snapshot publish executor.
//!
//! The core only ever defers one kind of work — publishing a snapshot blob
//! off the cycle's hot path — so this is a single unordered task queue,
//! simplified from the multi-priority GC/compaction scheduler elsewhere in
//! this codebase.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Runs a snapshot-publish task, either inline or on a background thread.
pub trait SnapshotPublishExecutor: Send + Sync {
    /// Execute (or enqueue) the given task.
    fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

/// Runs every task synchronously on the calling thread. The default.
pub struct InlineExecutor;

impl SnapshotPublishExecutor for InlineExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

struct PoolInner {
    queue: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    active_tasks: AtomicUsize,
}

/// Runs tasks on a small fixed pool of worker threads, off the cycle thread.
pub struct ThreadPoolExecutor {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPoolExecutor {
    /// Spawn `num_threads` workers named `cadence-snapshot-N`.
    pub fn new(num_threads: usize) -> Self {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads.max(1) {
            let inner = inner.clone();
            let handle = std::thread::Builder::new()
                .name(format!("cadence-snapshot-{i}"))
                .spawn(move || worker_loop(&inner))
                .expect("failed to spawn snapshot publish worker thread");
            workers.push(handle);
        }

        ThreadPoolExecutor {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Block until every queued and in-flight task has completed.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while !queue.is_empty() || self.inner.active_tasks.load(Ordering::Acquire) > 0 {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Signal workers to exit once the queue drains, and join them.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        let task = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    break None;
                }
                inner.work_ready.wait(&mut queue);
            }
        };
        let Some(task) = task else { break };
        inner.active_tasks.fetch_add(1, Ordering::Release);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task));
        if let Err(panic) = result {
            tracing::error!(target: "cadence::executor", "snapshot publish task panicked: {panic:?}");
        }
        inner.active_tasks.fetch_sub(1, Ordering::Release);
        inner.drain_cond.notify_all();
    }
}

impl SnapshotPublishExecutor for ThreadPoolExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        let mut queue = self.inner.queue.lock();
        queue.push_back(task);
        self.inner.work_ready.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;

    #[test]
    fn inline_executor_runs_synchronously() {
        let executor = InlineExecutor;
        let ran = Arc::new(Counter::new(0));
        let ran2 = ran.clone();
        executor.execute(Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn thread_pool_executor_runs_and_drains() {
        let executor = ThreadPoolExecutor::new(2);
        let ran = Arc::new(Counter::new(0));
        for _ in 0..8 {
            let ran = ran.clone();
            executor.execute(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        executor.drain();
        assert_eq!(ran.load(Ordering::SeqCst), 8);
    }
}
