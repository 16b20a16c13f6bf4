use crate::{ThreadPool, Result, BirdsError};
use tracing::{debug, error};

/// A thread pool that uses a work stealing strategy as implemented by the [`Rayon`] library.
///
/// A panicking job is logged and does not take the pool down.
///
/// [`Rayon`]: https://docs.rs/rayon/latest/rayon/index.html
pub struct RayonThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool for RayonThreadPool {

    fn new(threads: u32) -> Result<Self> where Self: Sized {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .thread_name(|i| format!("birds-rayon-{}", i))
            .panic_handler(|_| error!("a connection worker panicked"))
            .build()
            .map_err(|e|
                BirdsError::StringErr(format!("could not build thread pool: {:?}", &e)))?;
        debug!("created rayon pool with {} threads", &threads);

        Ok(
            Self { pool }
        )
    }

    fn spawn<F>(&self, job: F) -> Result<()> where F: FnOnce() + Send + 'static {
        self.pool.spawn(job);
        Ok(())
    }
}
