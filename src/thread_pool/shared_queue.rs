use std::thread;
use crossbeam::channel;
use crossbeam::channel::{Sender, Receiver};
use crate::{ThreadPool, BirdsError, Result};
use tracing::{error, debug, instrument};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool implemented with a shared job queue (i.e. channel).
///
/// This implementation uses the MPMC [`channel`] provided by the crossbeam crate, as a
/// single producer (the pool itself) with multiple consumers (the pool's threads).
///
/// If a job panics, the thread running it is replaced by a new one. Failing to start that
/// replacement is only logged, so the number of threads can shrink, and once it reaches zero
/// [`spawn`](ThreadPool::spawn) returns an error.
///
/// Dropping the pool closes the queue: every thread finishes the jobs already queued and
/// then exits.
///
/// [`channel`]: https://docs.rs/crossbeam/0.8.1/crossbeam/channel/index.html
pub struct SharedQueueThreadPool {
    /// the sending part of the channel
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {

    /// create a new pool with the given number of `threads`.
    /// Every thread created will have a handle to the receiving end of the channel
    fn new(threads: u32) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        for id in 0..threads {
            let task_rx = TaskReceiver { id, rx: rx.clone() };
            spawn_worker(task_rx)?;
        }
        debug!("created shared queue pool with {} threads", threads);
        Ok(SharedQueueThreadPool { tx })
    }

    fn spawn<F>(&self, job: F) -> Result<()>
        where
            F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .map_err(|_| BirdsError::StringErr("there are no threads left in the pool".to_string()))
    }
}

/// A type that can receive jobs from the channel and run them.
/// Additionally, this type is responsible for restarting its thread if a job panicked
#[derive(Clone, Debug)]
struct TaskReceiver {
    id: u32,
    rx: Receiver<Job>,
}

impl Drop for TaskReceiver {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!(worker = self.id, "worker panicked, starting a new thread");
            if let Err(e) = spawn_worker(self.clone()) {
                error!("Failed to spawn a thread: {}", e);
            }
        }
    }
}

fn spawn_worker(task_rx: TaskReceiver) -> Result<()> {
    thread::Builder::new()
        .name(format!("birds-worker-{}", task_rx.id))
        .spawn(move || run_tasks(task_rx))?;
    Ok(())
}

/// waits for jobs to arrive on the (wrapped) receiver and runs them, until the pool is dropped
#[instrument(skip(task_rx), fields(worker = task_rx.id))]
fn run_tasks(task_rx: TaskReceiver) {
    while let Ok(job) = task_rx.rx.recv() {
        job();
    }
    debug!("Thread exited because the thread pool was destroyed.");
}
