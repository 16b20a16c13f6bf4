use crate::command::{read_request, write_response};
use crate::config::ServerConfig;
use crate::handler::handle;
use crate::snapshot::SnapshotTask;
use crate::storage::{ensure_directory, load_snapshot, write_snapshot};
use crate::thread_pool::ThreadPool;
use crate::{BirdsEngine, BirdsError, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

// how often a waiting accept re-checks for finished workers and the shutdown flag. std has
// no accept with a timeout, so the listener is polled: a new connection may wait up to this
// long, and an idle server wakes up at this rate.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A TCP socket server over a bird catalog.
///
/// Every accepted connection carries exactly one request line and gets exactly one response
/// line. Connections are served on a [`ThreadPool`], never more of them at once than the
/// configured `proc_count`: while all workers are busy the server stops accepting.
///
/// On start-up the server loads the catalog from the snapshot files of its data directory
/// and from then on writes a snapshot periodically. It keeps serving until a client sends
/// QUIT or the [`ShutdownHandle`] is triggered, then it lets in-flight connections finish,
/// stops the snapshot task and writes one final snapshot.
///
/// # Example
/// ```rust,no_run
/// use birds::{BirdsServer, Catalog, ServerConfig, SharedQueueThreadPool, ThreadPool};
/// # fn main() -> birds::Result<()> {
/// let config = ServerConfig::builder().port(3000).data_dir("/tmp/serverdata").build();
/// let pool = SharedQueueThreadPool::new(config.proc_count)?;
/// let server = BirdsServer::bind(Catalog::new(), pool, config)?;
/// server.run()?;
/// # Ok(())
/// # }
/// ```
pub struct BirdsServer<E: BirdsEngine, P: ThreadPool> {
    /// the catalog shared by all workers
    engine: E,
    /// a pool of threads that serve the connections
    pool: P,
    config: ServerConfig,
    listener: TcpListener,
    shutdown: ShutdownHandle,
}

/// A handle that asks a running [`BirdsServer`] to shut down, e.g. from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// requests the shutdown, the server notices it within its accept poll
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// true once a shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl<E: BirdsEngine, P: ThreadPool> BirdsServer<E, P> {
    /// Prepares a server: creates the data directory and its snapshot files if missing,
    /// loads the snapshot into `engine` and binds the listener.
    ///
    /// # Errors
    /// returns an error if the configuration is invalid, the data directory is not usable,
    /// the snapshot cannot be read or the port cannot be bound
    pub fn bind(engine: E, pool: P, config: ServerConfig) -> Result<Self> {
        config.validate()?;
        ensure_directory(&config.data_dir)?;
        let state = load_snapshot(&config.data_dir)?;
        info!(
            birds = state.birds.len(),
            sightings = state.sighting_count(),
            "catalog loaded from {:?}",
            config.data_dir
        );
        engine.load(state);

        let listener = TcpListener::bind(config.listen_addr())?;
        listener.set_nonblocking(true)?;

        Ok(BirdsServer {
            engine,
            pool,
            config,
            listener,
            shutdown: ShutdownHandle::default(),
        })
    }

    /// the address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// a handle that stops this server once [`run`](BirdsServer::run) is going
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// serves connections until a shutdown is requested, then drains the workers and writes
    /// the final snapshot.
    ///
    /// # Errors
    /// returns an error if the snapshot task cannot be started, the pool stops accepting
    /// jobs, or the final snapshot cannot be written
    pub fn run(self) -> Result<()> {
        info!("Server listening on {}", self.local_addr()?);
        let snapshots = SnapshotTask::start(
            self.engine.clone(),
            self.config.data_dir.clone(),
            self.config.snapshot_interval,
        )?;

        let mut workers = Workers::new(self.config.proc_count);
        let served = self.accept_loop(&mut workers);

        info!("Server is shutting down");
        drop(self.listener);
        workers.drain();
        snapshots.stop();
        let saved = write_snapshot(&self.engine.dump(), &self.config.data_dir);
        if let Err(e) = &saved {
            error!("final snapshot failed: {}", e);
        }
        info!("Server is shutdown");

        served.and(saved)
    }

    fn accept_loop(&self, workers: &mut Workers) -> Result<()> {
        loop {
            if workers.reap() {
                self.shutdown.shutdown();
            }
            if self.shutdown.is_shutdown() {
                return Ok(());
            }

            // all workers busy: wait for one of them instead of accepting
            if workers.is_full() {
                if workers.wait(self.config.accept_timeout) {
                    self.shutdown.shutdown();
                }
                continue;
            }

            let accepted = accept_within(&self.listener, self.config.accept_timeout, || {
                workers.has_finished() || self.shutdown.is_shutdown()
            });
            match accepted {
                Ok(Some((stream, peer_addr))) => {
                    debug!("connection established with {}", peer_addr);
                    self.dispatch(workers, stream, peer_addr)?;
                }
                Ok(None) => {}
                Err(e) => error!("Connection failed: {}", e),
            }
        }
    }

    fn dispatch(&self, workers: &mut Workers, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        let engine = self.engine.clone();
        let read_timeout = self.config.read_timeout;
        let report = workers.start();

        self.pool.spawn(move || {
            let quit = match serve(&engine, stream, read_timeout) {
                Ok(quit) => quit,
                Err(e) => {
                    error!("Error on serving client {}: {}", peer_addr, e);
                    false
                }
            };
            debug!("connection with {} closed", peer_addr);
            report.finish(quit);
        })
    }
}

/// Serves one connection: reads a single request line, runs it against `engine`, writes the
/// response line and closes the connection.
///
/// Returns `Ok(true)` if the request was QUIT, even if the response could not be written. A
/// client that closes the connection before sending a complete line, or sends a line that
/// cannot be decoded, gets no response and yields `Ok(false)`.
///
/// # Errors
/// returns an IO error if reading the socket fails, including a read timeout, or if writing
/// the response to any request other than QUIT fails
pub fn serve<E: BirdsEngine>(engine: &E, tcp: TcpStream, read_timeout: Option<Duration>) -> Result<bool> {
    let peer_addr = tcp.peer_addr()?;
    tcp.set_nonblocking(false)?;
    tcp.set_read_timeout(read_timeout)?;
    let mut stream_reader = BufReader::new(&tcp);
    let mut stream_writer = BufWriter::new(&tcp);

    let request = match read_request(&mut stream_reader) {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("{} closed the connection without a request", peer_addr);
            return Ok(false);
        }
        Err(BirdsError::Decode(msg)) => {
            warn!("dropping undecodable request from {}: {}", peer_addr, msg);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    debug!("Receive request from {}: {:?}", peer_addr, request);

    let quit = request.is_quit();
    let response = handle(engine, request);
    match write_response(&mut stream_writer, &response) {
        Ok(()) => debug!("Response sent to {}: {:?}", peer_addr, response),
        Err(e) if quit => warn!("could not answer QUIT from {}: {}", peer_addr, e),
        Err(e) => return Err(e),
    }

    Ok(quit)
}

/// accepts a connection on the non-blocking `listener`, giving up after `timeout` or as soon
/// as `interrupted` returns true
fn accept_within(
    listener: &TcpListener,
    timeout: Duration,
    interrupted: impl Fn() -> bool,
) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    let deadline = Instant::now() + timeout;
    loop {
        match listener.accept() {
            Ok(accepted) => return Ok(Some(accepted)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let now = Instant::now();
                if interrupted() || now >= deadline {
                    return Ok(None);
                }
                thread::sleep(ACCEPT_POLL_INTERVAL.min(deadline - now));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Book-keeping of the connection workers that were started and have not been reaped yet
struct Workers {
    capacity: u32,
    in_flight: u32,
    done_tx: Sender<bool>,
    done_rx: Receiver<bool>,
}

impl Workers {
    fn new(capacity: u32) -> Self {
        let (done_tx, done_rx) = channel::unbounded();
        Workers {
            capacity,
            in_flight: 0,
            done_tx,
            done_rx,
        }
    }

    /// registers a new worker, the returned report must be moved into the worker's job
    fn start(&mut self) -> Report {
        self.in_flight += 1;
        Report {
            done_tx: self.done_tx.clone(),
            shutdown_requested: false,
        }
    }

    fn is_full(&self) -> bool {
        self.in_flight >= self.capacity
    }

    fn has_finished(&self) -> bool {
        !self.done_rx.is_empty()
    }

    /// collects every finished worker, true if any of them asked for a shutdown
    fn reap(&mut self) -> bool {
        let mut shutdown = false;
        while let Ok(quit) = self.done_rx.try_recv() {
            self.in_flight -= 1;
            shutdown |= quit;
        }
        shutdown
    }

    /// waits up to `timeout` for one worker to finish, true if it asked for a shutdown
    fn wait(&mut self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Ok(quit) => {
                self.in_flight -= 1;
                quit
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// blocks until every started worker has finished
    fn drain(&mut self) {
        if self.in_flight > 0 {
            info!("waiting for {} connection(s) to finish", self.in_flight);
        }
        while self.in_flight > 0 {
            match self.done_rx.recv() {
                Ok(_) => self.in_flight -= 1,
                Err(_) => break,
            }
        }
    }
}

/// Reports a worker as finished when dropped, which also covers jobs that panicked or were
/// never run
struct Report {
    done_tx: Sender<bool>,
    shutdown_requested: bool,
}

impl Report {
    /// reports the worker as finished, consuming the report
    fn finish(mut self, shutdown_requested: bool) {
        self.shutdown_requested = shutdown_requested;
    }
}

impl Drop for Report {
    fn drop(&mut self) {
        let _ = self.done_tx.send(self.shutdown_requested);
    }
}
