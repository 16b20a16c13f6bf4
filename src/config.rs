//! Server configuration with defaults and a builder, and the helpers both executables use to
//! parse their command lines.
use std::ffi::OsString;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::BaseDirs;

use crate::{BirdsError, Result};

/// the port the server listens on, and the client connects to, by default
pub const DEFAULT_PORT: u16 = 3000;

/// number of connection workers by default
pub const DEFAULT_PROC_COUNT: u32 = 2;

/// name of the default data directory, created in the user's home directory
pub const DEFAULT_DATA_DIR_NAME: &str = "serverdata";

/// Which [`ThreadPool`](crate::ThreadPool) implementation serves the connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// [`SharedQueueThreadPool`](crate::SharedQueueThreadPool)
    Shared,
    /// [`RayonThreadPool`](crate::RayonThreadPool)
    Rayon,
}

impl FromStr for PoolKind {
    type Err = BirdsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Ok(PoolKind::Shared),
            "rayon" => Ok(PoolKind::Rayon),
            other => Err(BirdsError::Parsing(format!(
                "unknown pool {:?}, expected 'shared' or 'rayon'",
                other
            ))),
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Shared => write!(f, "shared"),
            PoolKind::Rayon => write!(f, "rayon"),
        }
    }
}

/// Settings of a [`BirdsServer`](crate::BirdsServer)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on, on all interfaces. `0` picks a free port.
    pub port: u16,

    /// directory holding `birds.json` and `sightings.json`
    pub data_dir: PathBuf,

    /// number of connections served at the same time
    pub proc_count: u32,

    /// the thread pool implementation
    pub pool: PoolKind,

    /// how long a single accept waits before the server checks its workers and the
    /// shutdown flag again
    pub accept_timeout: Duration,

    /// time between two snapshots, the first one is taken at start-up
    pub snapshot_interval: Duration,

    /// how long a worker waits for the request line. `None` waits until the client sends it
    /// or the connection is torn down, so a stalled client keeps its worker busy.
    pub read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            proc_count: DEFAULT_PROC_COUNT,
            pool: PoolKind::Shared,
            accept_timeout: Duration::from_secs(5),
            snapshot_interval: Duration::from_secs(10),
            read_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// the address to bind the listener to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// checks the settings that have no sensible meaning when zero
    ///
    /// The port is not checked here: `0` binds a free port. Ports given on the command line
    /// are range checked by [`parse_port`].
    ///
    /// # Errors
    /// returns [`BirdsError::Parsing`] describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.proc_count < 1 {
            return Err(BirdsError::Parsing(
                "proc_count parameter should be a positive value".to_string(),
            ));
        }
        if self.accept_timeout.is_zero() || self.snapshot_interval.is_zero() {
            return Err(BirdsError::Parsing(
                "accept timeout and snapshot interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the number of workers
    pub fn proc_count(mut self, count: u32) -> Self {
        self.config.proc_count = count;
        self
    }

    /// Set the thread pool implementation
    pub fn pool(mut self, pool: PoolKind) -> Self {
        self.config.pool = pool;
        self
    }

    /// Set the accept poll timeout
    pub fn accept_timeout(mut self, timeout: Duration) -> Self {
        self.config.accept_timeout = timeout;
        self
    }

    /// Set the time between snapshots
    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.config.snapshot_interval = interval;
        self
    }

    /// Set the worker read timeout
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Finish the builder
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

/// `<home>/serverdata`, falling back to `$HOME` and then the current directory when the
/// home directory cannot be determined
pub fn default_data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().join(DEFAULT_DATA_DIR_NAME))
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(DEFAULT_DATA_DIR_NAME))
        })
        .unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DEFAULT_DATA_DIR_NAME)
        })
}

/// parses a port given on the command line, it must be in the range 1..65535
pub fn parse_port(value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(BirdsError::Parsing(format!(
            "Server port should be in a range 1..65535, got {:?}",
            value
        ))),
    }
}

/// parses a worker count given on the command line, it must be positive
pub fn parse_proc_count(value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(count) if count >= 1 => Ok(count),
        _ => Err(BirdsError::Parsing(format!(
            "proc_count parameter should be a positive value, got {:?}",
            value
        ))),
    }
}

/// rewrites the single dash long flags of the command line (`-port`, `-addbird`, ...) into
/// the double dash form clap expects, matching the `known` flag names case-insensitively.
///
/// The first argument (the program name) and anything that is not a known flag, including
/// flag values, are passed through unchanged.
pub fn normalize_flags<I>(args: I, known: &[&str]) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 {
                return arg;
            }
            let flag = arg
                .to_str()
                .and_then(|s| s.strip_prefix("--").or_else(|| s.strip_prefix('-')))
                .and_then(|name| known.iter().find(|flag| flag.eq_ignore_ascii_case(name)));
            match flag {
                Some(flag) => OsString::from(format!("--{}", flag)),
                None => arg,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn legacy_flags_are_normalized() {
        let args = normalize_flags(
            os_args(&["birds-server", "-port", "4000", "-PROC_COUNT", "3", "--data", "-x"]),
            &["port", "data", "proc_count"],
        );
        assert_eq!(
            args,
            os_args(&["birds-server", "--port", "4000", "--proc_count", "3", "--data", "-x"])
        );
    }

    #[test]
    fn program_name_is_left_alone() {
        let args = normalize_flags(os_args(&["-quit", "-quit"]), &["quit"]);
        assert_eq!(args, os_args(&["-quit", "--quit"]));
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.proc_count, 2);
        assert_eq!(config.pool, PoolKind::Shared);
        assert_eq!(config.accept_timeout, Duration::from_secs(5));
        assert_eq!(config.snapshot_interval, Duration::from_secs(10));
        assert_eq!(config.read_timeout, None);
        assert!(config.data_dir.ends_with("serverdata"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ServerConfig::builder()
            .port(0)
            .data_dir("/tmp/birds")
            .proc_count(4)
            .pool(PoolKind::Rayon)
            .read_timeout(Some(Duration::from_secs(1)))
            .build();
        assert_eq!(config.port, 0);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/birds"));
        assert_eq!(config.proc_count, 4);
        assert_eq!(config.pool, PoolKind::Rayon);
        assert_eq!(config.read_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn port_zero_passes_validation() {
        let config = ServerConfig::builder().port(0).build();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().port(), 0);
    }

    #[test]
    fn zero_workers_is_invalid() {
        let config = ServerConfig::builder().proc_count(0).build();
        assert!(matches!(config.validate(), Err(BirdsError::Parsing(_))));
    }

    #[test]
    fn port_range() {
        assert_eq!(parse_port("3000").unwrap(), 3000);
        assert_eq!(parse_port("65535").unwrap(), 65535);
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("http").is_err());
    }

    #[test]
    fn proc_count_must_be_positive() {
        assert_eq!(parse_proc_count("8").unwrap(), 8);
        assert!(parse_proc_count("0").is_err());
        assert!(parse_proc_count("-1").is_err());
    }

    #[test]
    fn pool_kind_parses_case_insensitively() {
        assert_eq!("Rayon".parse::<PoolKind>().unwrap(), PoolKind::Rayon);
        assert_eq!("shared".parse::<PoolKind>().unwrap(), PoolKind::Shared);
        assert!("naive".parse::<PoolKind>().is_err());
    }
}
