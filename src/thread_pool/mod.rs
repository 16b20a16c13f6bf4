//! Thread pools that run the server's connection workers.
//!
//! The pools themselves queue jobs without bound. The server never hands a pool more jobs
//! than it has threads, see [`BirdsServer`](crate::BirdsServer).
use crate::Result;

mod rayon_pool;
mod shared_queue;

pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;

/// A pool of threads that jobs can be spawned into
pub trait ThreadPool: Send + 'static {
    /// creates a new pool running `threads` threads
    ///
    /// # Errors
    /// returns an error if the threads could not be started
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// queues `job` to run on one of the pool's threads
    ///
    /// # Errors
    /// returns an error if the pool can no longer run jobs
    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use std::time::Duration;

    fn runs_all_jobs<P: ThreadPool>() {
        let pool = P::new(3).unwrap();
        let (tx, rx) = channel::unbounded();
        for i in 0..20 {
            let tx = tx.clone();
            pool.spawn(move || tx.send(i).unwrap()).unwrap();
        }
        let mut got: Vec<i32> = (0..20)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort_unstable();
        assert_eq!(got, (0..20).collect::<Vec<_>>());
    }

    fn survives_panicking_job<P: ThreadPool>() {
        let pool = P::new(1).unwrap();
        pool.spawn(|| panic!("job failed")).unwrap();

        let (tx, rx) = channel::bounded(1);
        pool.spawn(move || tx.send(()).unwrap()).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn shared_queue_runs_all_jobs() {
        runs_all_jobs::<SharedQueueThreadPool>();
    }

    #[test]
    fn rayon_runs_all_jobs() {
        runs_all_jobs::<RayonThreadPool>();
    }

    #[test]
    fn shared_queue_survives_panicking_job() {
        survives_panicking_job::<SharedQueueThreadPool>();
    }

    #[test]
    fn rayon_survives_panicking_job() {
        survives_panicking_job::<RayonThreadPool>();
    }
}
