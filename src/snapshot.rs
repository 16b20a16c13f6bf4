//! The periodic snapshot task of the server.
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use tracing::{debug, error};

use crate::engine::BirdsEngine;
use crate::storage::write_snapshot;
use crate::Result;

/// A background thread that writes a snapshot of the catalog into the data directory right
/// away and then once every interval, until stopped.
///
/// A failed snapshot is logged and the task keeps going.
#[derive(Debug)]
pub struct SnapshotTask {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl SnapshotTask {
    /// starts taking snapshots of `engine` into `data_dir` every `interval`
    pub fn start<E: BirdsEngine>(engine: E, data_dir: PathBuf, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("birds-snapshot".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                take_snapshot(&engine, &data_dir);
                loop {
                    crossbeam::select! {
                        recv(ticker) -> _ => take_snapshot(&engine, &data_dir),
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!("snapshot task stopped");
            })?;
        Ok(SnapshotTask { stop_tx, handle })
    }

    /// stops the task and waits for a snapshot in progress to finish
    pub fn stop(self) {
        drop(self.stop_tx);
        if self.handle.join().is_err() {
            error!("snapshot task panicked");
        }
    }
}

fn take_snapshot<E: BirdsEngine>(engine: &E, data_dir: &Path) {
    if let Err(e) = write_snapshot(&engine.dump(), data_dir) {
        error!("There is an exception during persistence to file: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Catalog;
    use crate::model::Bird;
    use crate::storage::{ensure_directory, load_snapshot};
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn first_snapshot_is_taken_immediately() {
        let temp = TempDir::new().unwrap();
        ensure_directory(temp.path()).unwrap();
        let catalog = Catalog::new();
        catalog.add_bird(Bird::new("Robin", "red", "70", "14")).unwrap();

        let task = SnapshotTask::start(catalog, temp.path().to_path_buf(), Duration::from_secs(3600)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while load_snapshot(temp.path()).unwrap().birds.is_empty() {
            assert!(Instant::now() < deadline, "no snapshot written");
            thread::sleep(Duration::from_millis(20));
        }
        task.stop();
    }

    #[test]
    fn later_ticks_pick_up_changes() {
        let temp = TempDir::new().unwrap();
        ensure_directory(temp.path()).unwrap();
        let catalog = Catalog::new();

        let task = SnapshotTask::start(catalog.clone(), temp.path().to_path_buf(), Duration::from_millis(50)).unwrap();
        catalog.add_bird(Bird::new("Crow", "black", "500", "40")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !load_snapshot(temp.path()).unwrap().birds.contains_key("Crow") {
            assert!(Instant::now() < deadline, "change never persisted");
            thread::sleep(Duration::from_millis(20));
        }
        task.stop();
    }

    #[test]
    fn failing_snapshots_do_not_stop_the_task() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");

        let task = SnapshotTask::start(Catalog::new(), missing, Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(50));
        task.stop();
    }
}
