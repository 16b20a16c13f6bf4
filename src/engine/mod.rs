//! This module provides the catalog "engine": the in-memory indices of birds and their
//! sightings that every connection worker and the snapshot task share.
//!
//! The [`BirdsEngine`] trait is the seam between the request handler and the storage, and
//! [`Catalog`] is the concurrent implementation used by the server.
use std::collections::HashMap;

use crate::model::{Bird, Sighting, SightingsQuery};
use crate::Result;

/// A trait for the operations the request handler can perform on a catalog.
///
/// Implementors are cheap handles to shared state, cloning one must not copy the data.
pub trait BirdsEngine: Clone + Send + Sync + 'static {
    /// adds a new `bird`
    ///
    /// # Errors
    ///
    /// Returns `BirdsError::AlreadyExists` if a bird with the same name is already stored,
    /// the stored bird is left untouched.
    fn add_bird(&self, bird: Bird) -> Result<()>;

    /// appends a `sighting` to the sightings of its bird
    ///
    /// # Errors
    ///
    /// Returns `BirdsError::UnknownBird` if the bird is not in the catalog and
    /// `BirdsError::DuplicateSighting` if an equal sighting was already added.
    fn add_sighting(&self, sighting: Sighting) -> Result<()>;

    /// returns a copy of every bird, in no particular order
    fn list_birds(&self) -> Vec<Bird>;

    /// returns every sighting matching the `query`, in no particular order
    ///
    /// # Errors
    ///
    /// Returns `BirdsError::BadPattern` if the query's bird name pattern is not a valid
    /// regular expression.
    fn list_sightings(&self, query: &SightingsQuery) -> Result<Vec<Sighting>>;

    /// removes the bird with the given `name` together with all of its sightings
    ///
    /// # Errors
    ///
    /// Returns `BirdsError::UnknownBird` if the given `name` is not found.
    fn remove(&self, name: &str) -> Result<()>;

    /// replaces the whole content of the catalog with `state`
    fn load(&self, state: CatalogState);

    /// returns a point-in-time copy of the whole catalog
    fn dump(&self) -> CatalogState;
}

/// A plain, owned copy of a catalog's content, exchanged with the storage layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogState {
    /// birds keyed by name
    pub birds: HashMap<String, Bird>,
    /// sightings keyed by bird name
    pub sightings: HashMap<String, Vec<Sighting>>,
}

impl CatalogState {
    /// the number of sightings over all birds
    pub fn sighting_count(&self) -> usize {
        self.sightings.values().map(Vec::len).sum()
    }
}

mod catalog;

pub use self::catalog::Catalog;
