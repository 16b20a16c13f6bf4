#![deny(missing_docs)]
//! A multithreaded catalog of birds and bird sightings, served over TCP.
//!
//! This crate provides the [`Catalog`] itself, the [`BirdsServer`] that shares it between
//! concurrent connections, the [`BirdsClient`] that talks to it, and the `birds-server` and
//! `birds-client` executables built on top of them.
//!
//! ## Supported Operations
//! A client sends exactly one request per connection and receives exactly one response:
//!
//! - `ADD_BIRD` adds a [`Bird`], names are unique
//! - `ADD_SIGHTING` adds a [`Sighting`] of a bird that is in the catalog
//! - `LIST_BIRDS` lists all birds
//! - `LIST_SIGHTING` lists the sightings whose bird name matches a regular expression and
//! whose date lies in a given period, see [`SightingsQuery`]
//! - `REMOVE` removes a bird together with all its sightings
//! - `QUIT` shuts the server down
//!
//! See the [`BirdsEngine`] trait and the [`Request`] and [`Response`] types for more
//! information on the structure of these operations.
//!
//! ## Protocol
//! Requests and responses are single lines of JSON of the form
//! `{"action": ..., "object": ..., "comment": ...}`, where the shape of `object` is selected
//! by `action`. Failures are reported as a human readable `comment`. See the [`command`]
//! module.
//!
//! ## Persistence
//! The catalog lives in memory. The server writes a snapshot of it into `birds.json` and
//! `sightings.json` of its data directory at start-up, every 10 seconds, and once more when
//! it shuts down, and loads it from there when it starts. See the [`storage`] module.

pub use client::BirdsClient;
pub use command::{Action, Request, Response};
pub use config::{PoolKind, ServerConfig};
pub use engine::{BirdsEngine, Catalog, CatalogState};
pub use error::{BirdsError, Result};
pub use model::{Bird, Sighting, SightingsQuery};
pub use server::{BirdsServer, ShutdownHandle};
pub use thread_pool::{RayonThreadPool, SharedQueueThreadPool, ThreadPool};

mod client;
pub mod command;
pub mod config;
mod engine;
mod error;
pub mod handler;
pub mod model;
mod server;
pub mod snapshot;
pub mod storage;
pub mod thread_pool;
