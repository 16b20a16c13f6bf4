use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use regex::Regex;
use tracing::{debug, warn};

use super::{BirdsEngine, CatalogState};
use crate::model::{Bird, Sighting, SightingsQuery};
use crate::{BirdsError, Result};

/// The concurrent, in-memory catalog of birds and sightings.
///
/// Both indices are [`DashMap`]s, so operations on different names rarely contend. Each list
/// of sightings lives inside its map shard and is only ever touched while holding that
/// shard's lock.
///
/// Locks are always taken in the same order: the snapshot gate, then a `birds` shard, then a
/// `sightings` shard. Mutations hold the gate shared and [`dump`](BirdsEngine::dump) /
/// [`load`](BirdsEngine::load) hold it exclusively, so a dump never observes a half
/// applied mutation.
///
/// Cloning a `Catalog` gives another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    birds: DashMap<String, Bird>,
    sightings: DashMap<String, Vec<Sighting>>,
    gate: RwLock<()>,
}

impl Catalog {
    /// creates an empty catalog
    pub fn new() -> Self {
        Catalog::default()
    }

    /// creates a catalog holding the given `state`
    pub fn from_state(state: CatalogState) -> Self {
        let catalog = Catalog::new();
        catalog.load(state);
        catalog
    }

    /// the number of birds currently in the catalog
    pub fn bird_count(&self) -> usize {
        self.inner.birds.len()
    }

    /// the number of sightings currently in the catalog
    pub fn sighting_count(&self) -> usize {
        self.inner.sightings.iter().map(|entry| entry.value().len()).sum()
    }

    // a poisoned gate only means some other mutation panicked, the maps are still usable
    fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.gate.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BirdsEngine for Catalog {
    fn add_bird(&self, bird: Bird) -> Result<()> {
        let _gate = self.shared();
        match self.inner.birds.entry(bird.name.clone()) {
            Entry::Occupied(_) => Err(BirdsError::AlreadyExists(bird.name)),
            Entry::Vacant(entry) => {
                entry.insert(bird);
                Ok(())
            }
        }
    }

    fn add_sighting(&self, sighting: Sighting) -> Result<()> {
        let _gate = self.shared();
        // keep the bird's shard read-locked so a concurrent remove cannot slip in between the
        // existence check and the append
        let bird = match self.inner.birds.get(&sighting.bird_name) {
            Some(bird) => bird,
            None => return Err(BirdsError::UnknownBird(sighting.bird_name)),
        };

        let mut sightings = self
            .inner
            .sightings
            .entry(sighting.bird_name.clone())
            .or_default();
        if sightings.contains(&sighting) {
            return Err(BirdsError::DuplicateSighting);
        }
        sightings.push(sighting);

        drop(sightings);
        drop(bird);
        Ok(())
    }

    fn list_birds(&self) -> Vec<Bird> {
        self.inner
            .birds
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn list_sightings(&self, query: &SightingsQuery) -> Result<Vec<Sighting>> {
        let pattern = full_match(&query.bird_name_pattern)?;

        let mut found = vec![];
        for entry in self.inner.sightings.iter() {
            found.extend(
                entry
                    .value()
                    .iter()
                    .filter(|s| pattern.is_match(&s.bird_name) && query.contains(&s.sighting_date_time))
                    .cloned(),
            );
        }
        Ok(found)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let _gate = self.shared();
        // the occupied entry write-locks the bird's shard until both removals are done
        match self.inner.birds.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                self.inner.sightings.remove(name);
                entry.remove();
                Ok(())
            }
            Entry::Vacant(_) => Err(BirdsError::UnknownBird(name.to_string())),
        }
    }

    fn load(&self, state: CatalogState) {
        let state = sanitize(state);
        let _gate = self.exclusive();

        self.inner.birds.clear();
        self.inner.sightings.clear();
        for (name, bird) in state.birds {
            self.inner.birds.insert(name, bird);
        }
        for (name, sightings) in state.sightings {
            self.inner.sightings.insert(name, sightings);
        }
    }

    fn dump(&self) -> CatalogState {
        let _gate = self.exclusive();

        let birds = self
            .inner
            .birds
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let sightings = self
            .inner
            .sightings
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        CatalogState { birds, sightings }
    }
}

/// compiles `pattern` so that it only matches whole bird names.
///
/// The raw pattern is compiled first so that syntax errors are reported against what the
/// user typed rather than the anchored form.
fn full_match(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| BirdsError::BadPattern(e.to_string()))?;
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| BirdsError::BadPattern(e.to_string()))
}

/// re-groups sightings by their bird name and drops anything that would break the catalog
/// invariants: sightings of birds that are not in `state.birds`, and repeated sightings.
fn sanitize(state: CatalogState) -> CatalogState {
    let CatalogState { birds, sightings } = state;
    let mut grouped: HashMap<String, Vec<Sighting>> = HashMap::new();
    let mut seen: HashSet<Sighting> = HashSet::new();
    let mut orphans = 0_usize;
    let mut duplicates = 0_usize;

    for sighting in sightings.into_values().flatten() {
        if !birds.contains_key(&sighting.bird_name) {
            orphans += 1;
            continue;
        }
        if !seen.insert(sighting.clone()) {
            duplicates += 1;
            continue;
        }
        grouped
            .entry(sighting.bird_name.clone())
            .or_default()
            .push(sighting);
    }

    if orphans > 0 {
        warn!(orphans, "dropped sightings of birds that are not in the catalog");
    }
    if duplicates > 0 {
        warn!(duplicates, "dropped duplicate sightings");
    }
    debug!(birds = birds.len(), "catalog state sanitized");

    CatalogState {
        birds,
        sightings: grouped,
    }
}
