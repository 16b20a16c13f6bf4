//! this binary starts the birds server
//!
//! `birds-server [-port PORT] [-data DIR] [-proc_count N] [-pool shared|rayon]`
//!
//!     -port        the port to listen on, 1..65535, defaults to 3000
//!     -data        the data directory holding the snapshot files, defaults to ~/serverdata
//!     -proc_count  the number of connections served at the same time, defaults to 2
//!     -pool        the thread pool implementation, defaults to "shared"
//!
//! The server runs until a client sends QUIT, or it receives Ctrl+C / SIGTERM. It exits with
//! a non-zero code if it could not start.

use std::env;
use std::path::PathBuf;
use std::process::exit;
use clap::{crate_version, App, Arg, ArgMatches};
use birds::config::{normalize_flags, parse_port, parse_proc_count, DEFAULT_PORT, DEFAULT_PROC_COUNT};
use birds::{BirdsError, BirdsServer, Catalog, PoolKind, RayonThreadPool, Result, ServerConfig, SharedQueueThreadPool, ThreadPool};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const FLAGS: [&str; 4] = ["port", "data", "proc_count", "pool"];

fn main() {
    // set up a tracing subscriber to log to STDERR
    subscriber_config();

    // parse command line args
    let matches = App::new("birds-server")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("a multi-threaded bird sightings catalog")
        .arg(Arg::with_name("port")
            .long("port")
            .value_name("PORT")
            .help("sets the port that the server listens on"))
        .arg(Arg::with_name("data")
            .long("data")
            .value_name("DIR")
            .help("sets the directory the catalog is persisted in"))
        .arg(Arg::with_name("proc_count")
            .long("proc_count")
            .value_name("N")
            .help("sets the number of connections served concurrently"))
        .arg(Arg::with_name("pool")
            .long("pool")
            .value_name("POOL")
            .help("sets the thread pool to use, either 'shared' or 'rayon'"))
        .get_matches_from(normalize_flags(env::args_os(), &FLAGS));

    // validate command line options
    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(config) {
        eprintln!("{}", e);
        exit(1);
    }
}

/// builds the server configuration from the command line, using defaults for absent flags
fn build_config(matches: &ArgMatches) -> Result<ServerConfig> {
    let mut builder = ServerConfig::builder()
        .port(DEFAULT_PORT)
        .proc_count(DEFAULT_PROC_COUNT);
    if let Some(port) = matches.value_of("port") {
        builder = builder.port(parse_port(port)?);
    }
    if let Some(data) = matches.value_of_os("data") {
        builder = builder.data_dir(PathBuf::from(data));
    }
    if let Some(count) = matches.value_of("proc_count") {
        builder = builder.proc_count(parse_proc_count(count)?);
    }
    if let Some(pool) = matches.value_of("pool") {
        builder = builder.pool(pool.parse()?);
    }
    Ok(builder.build())
}

fn run(config: ServerConfig) -> Result<()> {
    info!("birds-server {}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", config.data_dir);
    info!("Thread pool: {} with {} threads", config.pool, config.proc_count);

    match config.pool {
        PoolKind::Shared => run_with_pool(SharedQueueThreadPool::new(config.proc_count)?, config),
        PoolKind::Rayon => run_with_pool(RayonThreadPool::new(config.proc_count)?, config),
    }
}

fn run_with_pool<P: ThreadPool>(pool: P, config: ServerConfig) -> Result<()> {
    let server = BirdsServer::bind(Catalog::new(), pool, config)?;

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Received termination signal, initiating shutdown...");
        shutdown.shutdown();
    })
    .map_err(|e| BirdsError::StringErr(format!("could not install the signal handler: {}", e)))?;

    server.run()
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        // all spans/events with a level higher than DEBUG (e.g, info, warn, etc.)
        // will be written.
        .with_max_level(Level::DEBUG)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting tracing default subscriber failed: {}", e);
    }
}
