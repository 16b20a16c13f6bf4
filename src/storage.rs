//! Snapshot persistence of a catalog into two JSON files inside a data directory:
//!
//! - `birds.json` holds a JSON array with one element per bird
//! - `sightings.json` holds a JSON array with one element per bird that has sightings, each
//! element being the list of that bird's sightings
//!
//! Every element is itself written as a *string* containing the JSON encoding of the value,
//! e.g. `["{\"name\":\"Robin\",...}"]`. Existing data directories use this layout so it is
//! kept for writing. When reading, plain nested elements (objects and arrays rather than
//! strings) are accepted as well.
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::engine::CatalogState;
use crate::model::{Bird, Sighting};
use crate::Result;

/// file name of the birds snapshot
pub const BIRDS_FILE: &str = "birds.json";

/// file name of the sightings snapshot
pub const SIGHTINGS_FILE: &str = "sightings.json";

/// creates the data directory `dir` and both snapshot files, if they are missing.
///
/// # Errors
/// returns an IO error if the directory cannot be created, or if a snapshot file cannot be
/// opened for both reading and writing
pub fn ensure_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| with_path(e, "could not create data directory", dir))?;

    for name in [BIRDS_FILE, SIGHTINGS_FILE] {
        let path = dir.join(name);
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| with_path(e, "no read/write access to", &path))?;
    }
    Ok(())
}

/// overwrites both snapshot files in `dir` with the content of `state`.
///
/// Each file is first written next to its target and then renamed over it, so a concurrent
/// reader, or a crash mid-write, never sees a partially written file.
#[instrument(skip(state), fields(birds = state.birds.len(), sightings = state.sighting_count()))]
pub fn write_snapshot(state: &CatalogState, dir: &Path) -> Result<()> {
    let mut birds: Vec<&Bird> = state.birds.values().collect();
    birds.sort_by(|a, b| a.name.cmp(&b.name));
    write_file(&dir.join(BIRDS_FILE), &encode_elements(&birds)?)?;

    let mut sightings: Vec<(&String, &Vec<Sighting>)> = state
        .sightings
        .iter()
        .filter(|(_, list)| !list.is_empty())
        .collect();
    sightings.sort_by(|a, b| a.0.cmp(b.0));
    let sightings: Vec<&Vec<Sighting>> = sightings.into_iter().map(|(_, list)| list).collect();
    write_file(&dir.join(SIGHTINGS_FILE), &encode_elements(&sightings)?)?;

    debug!("snapshot written to {:?}", dir);
    Ok(())
}

/// reads the birds snapshot at `path`, an empty file yields an empty map.
///
/// If the same name appears more than once, the first bird wins.
pub fn read_birds(path: &Path) -> Result<HashMap<String, Bird>> {
    let mut birds = HashMap::new();
    for element in read_elements(path)? {
        let bird: Bird = decode_element(element)?;
        birds.entry(bird.name.clone()).or_insert(bird);
    }
    Ok(birds)
}

/// reads the sightings snapshot at `path`, an empty file yields an empty map.
///
/// Sightings are grouped by their own bird name, regardless of which element of the file
/// they were stored in.
pub fn read_sightings(path: &Path) -> Result<HashMap<String, Vec<Sighting>>> {
    let mut sightings: HashMap<String, Vec<Sighting>> = HashMap::new();
    for element in read_elements(path)? {
        let list: Vec<Sighting> = decode_element(element)?;
        for sighting in list {
            sightings
                .entry(sighting.bird_name.clone())
                .or_default()
                .push(sighting);
        }
    }
    Ok(sightings)
}

/// reads both snapshot files of the data directory `dir`
pub fn load_snapshot(dir: &Path) -> Result<CatalogState> {
    Ok(CatalogState {
        birds: read_birds(&dir.join(BIRDS_FILE))?,
        sightings: read_sightings(&dir.join(SIGHTINGS_FILE))?,
    })
}

/// encodes every value as a JSON string and wraps the strings into a JSON array
fn encode_elements<T: Serialize>(values: &[T]) -> Result<Vec<u8>> {
    let elements = values
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<String>>>()?;
    Ok(serde_json::to_vec(&elements)?)
}

fn read_elements(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path).map_err(|e| with_path(e, "could not read", path))?;
    if content.trim().is_empty() {
        return Ok(vec![]);
    }
    Ok(serde_json::from_str(&content)?)
}

fn decode_element<T: DeserializeOwned>(element: Value) -> Result<T> {
    match element {
        Value::String(encoded) => Ok(serde_json::from_str(&encoded)?),
        nested => Ok(serde_json::from_value(nested)?),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    let mut file = File::create(&tmp).map_err(|e| with_path(e, "could not create", &tmp))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path).map_err(|e| with_path(e, "could not replace", path))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn with_path(e: io::Error, what: &str, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{} {:?}: {}", what, path, e))
}
