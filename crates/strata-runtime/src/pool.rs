use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, bounded};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Fixed set of long-running worker loops on a dedicated rayon pool.
///
/// Each loop holds a clone of an exit sender; `join` drops the original and
/// waits for the channel to disconnect, which happens once every loop has
/// returned (or unwound).
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
    exit_tx: Option<Sender<()>>,
    exit_rx: Receiver<()>,
}

impl WorkerPool {
    pub fn new(workers: usize, name: &'static str) -> Result<Self, ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{name}-{i}"))
            .panic_handler(|_| log::error!(target: "runtime", "worker loop panicked"))
            .build()?;
        let (exit_tx, exit_rx) = bounded(0);
        Ok(Self {
            pool,
            workers,
            exit_tx: Some(exit_tx),
            exit_rx,
        })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Starts one `body(worker_index)` loop per thread. Call once.
    pub fn start<F>(&self, body: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let Some(exit_tx) = self.exit_tx.as_ref() else {
            return;
        };
        let body = Arc::new(body);
        for i in 0..self.workers {
            let body = Arc::clone(&body);
            let guard = exit_tx.clone();
            self.pool.spawn(move || {
                let _guard = guard;
                body(i);
            });
        }
    }

    /// Blocks until every loop has returned. Idempotent. Must not be called
    /// from a worker.
    pub fn join(&mut self) {
        drop(self.exit_tx.take());
        while self.exit_rx.recv().is_ok() {}
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn join_waits_for_every_loop() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(3, "test-worker").unwrap();
        let counter = Arc::clone(&done);
        pool.start(move |_| {
            std::thread::sleep(std::time::Duration::from_millis(10));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        pool.join();
        assert_eq!(done.load(Ordering::SeqCst), 3);
        pool.join();
    }

    #[test]
    fn workers_run_on_named_threads() {
        let mut pool = WorkerPool::new(2, "named").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        pool.start(move |_| {
            let name = std::thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        });
        pool.join();
        let names: Vec<_> = rx.try_iter().flatten().collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("named-")));
    }
}
