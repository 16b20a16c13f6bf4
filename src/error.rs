use std::io;
use thiserror::Error;

/// type alias for all operations on the catalog, server or client that could fail with a
/// [`BirdsError`]
pub type Result<T> = std::result::Result<T, BirdsError>;

/// The Error variants used throughout the crate.
///
/// The first group are the "semantic" errors a [`Catalog`](crate::Catalog) reports back to
/// the request handler. They are turned into human readable comments on the wire and never
/// cross the connection boundary as errors.
#[derive(Debug, Error)]
pub enum BirdsError {
    /// a bird with this name is already in the catalog
    #[error("bird {0} already exists")]
    AlreadyExists(String),

    /// no bird with this name is in the catalog
    #[error("bird {0} does not exist")]
    UnknownBird(String),

    /// a sighting with identical bird name, location and date/time is already stored
    #[error("sighting with such parameters already exists")]
    DuplicateSighting,

    /// the bird name pattern of a sightings query is not a valid regular expression
    #[error("{0}")]
    BadPattern(String),

    /// a date or date/time entered on the client could not be parsed
    #[error("bad date/time format: {0}")]
    BadFormat(String),

    /// a protocol frame could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// a command line option or configuration value was invalid
    #[error("parsing error: {0}")]
    Parsing(String),

    /// a generic error carrying a message, usually received from the peer
    #[error("{0}")]
    StringErr(String),

    /// variant for errors caused from file or socket IO
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serde Error
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
