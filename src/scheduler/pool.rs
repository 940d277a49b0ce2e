//! Bounded worker pool with submit-returns-handle tasks
//!
//! A fixed set of threads pulls boxed jobs from one shared queue. Every
//! `submit` returns a `TaskHandle` that yields the job's value.
//!
//! Scene tasks submit tile tasks into the same pool and wait on them. When
//! `TaskHandle::wait` is called on a worker thread it keeps executing queued
//! jobs until its own result arrives, so nested waits cannot starve the
//! pool even when it has a single worker. True parallelism stays capped at
//! the pool size.

use crossbeam_channel::{select, Receiver, Sender};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crate::error::PoolError;

type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    /// Job queue of the pool the current thread works for, if any
    static WORKER_QUEUE: RefCell<Option<Receiver<Job>>> = const { RefCell::new(None) };
}

/// Cloneable submission side of a `WorkerPool`
#[derive(Clone)]
pub struct PoolHandle {
    jobs: Sender<Job>,
}

impl PoolHandle {
    /// Queue `task` and return a handle to its result
    pub fn submit<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);

        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task)).map_err(|_| PoolError::TaskPanicked);
            // The handle may already be gone; nobody is waiting then
            let _ = result_tx.send(outcome);
        });

        // A rejected job is dropped with its sender, which the handle
        // reports as `Disconnected`
        let _ = self.jobs.send(job);

        TaskHandle { result: result_rx }
    }
}

/// Pending result of a submitted task
pub struct TaskHandle<T> {
    result: Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes
    pub fn wait(self) -> Result<T, PoolError> {
        let queue = WORKER_QUEUE.with(|queue| queue.borrow().clone());

        let Some(jobs) = queue else {
            return self.result.recv().map_err(|_| PoolError::Disconnected)?;
        };

        // On a worker: help drain the queue while waiting
        loop {
            select! {
                recv(self.result) -> outcome => {
                    return outcome.map_err(|_| PoolError::Disconnected)?;
                }
                recv(jobs) -> job => match job {
                    Ok(job) => job(),
                    Err(_) => {
                        return self.result.recv().map_err(|_| PoolError::Disconnected)?;
                    }
                }
            }
        }
    }
}

/// Fixed-size pool of worker threads
///
/// The size is chosen once. A different size means building a new pool.
pub struct WorkerPool {
    handle: Option<PoolHandle>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> std::io::Result<Self> {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..size.max(1))
            .map(|index| {
                let jobs = jobs_rx.clone();
                thread::Builder::new()
                    .name(format!("pano-worker-{}", index))
                    .spawn(move || worker_loop(jobs))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self {
            handle: Some(PoolHandle { jobs: jobs_tx }),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Submission handle that can be moved into tasks
    pub fn handle(&self) -> PoolHandle {
        match &self.handle {
            Some(handle) => handle.clone(),
            None => unreachable!("pool handle is only taken on drop"),
        }
    }

    pub fn submit<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.handle().submit(task)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers exit once every sender is gone and the queue is drained
        self.handle.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(jobs: Receiver<Job>) {
    WORKER_QUEUE.with(|queue| *queue.borrow_mut() = Some(jobs.clone()));
    for job in jobs.iter() {
        job();
    }
    WORKER_QUEUE.with(|queue| queue.borrow_mut().take());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_submit_returns_value() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit(|| 21 * 2);
        assert_eq!(handle.wait(), Ok(42));
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let pool = WorkerPool::new(1).unwrap();
        let handle = pool.submit(|| -> u32 { panic!("boom") });
        assert_eq!(handle.wait(), Err(PoolError::TaskPanicked));

        // The worker survives the panic
        assert_eq!(pool.submit(|| 7).wait(), Ok(7));
    }

    #[test]
    fn test_parallelism_is_capped_by_pool_size() {
        let pool = WorkerPool::new(3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..24)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                pool.submit(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.wait().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_nested_waits_do_not_deadlock_single_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let inner_pool = pool.handle();
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let seen_outer = Arc::clone(&seen);
        let outer = pool.submit(move || {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let seen = Arc::clone(&seen_outer);
                    inner_pool.submit(move || {
                        seen.lock().unwrap().insert(i);
                        i
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.wait().unwrap())
                .sum::<usize>()
        });

        assert_eq!(outer.wait(), Ok((0..16).sum()));
        assert_eq!(seen.lock().unwrap().len(), 16);
    }

    #[test]
    fn test_drop_joins_after_draining() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(2).unwrap();
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                // Handles dropped immediately: fire and forget
                let _ = pool.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
