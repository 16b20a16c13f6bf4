use birds::storage::{load_snapshot, write_snapshot};
use birds::{Bird, BirdsEngine, BirdsError, Catalog, Result, Sighting, SightingsQuery};
use chrono::NaiveDate;
use crossbeam_utils::sync::WaitGroup;
use crossbeam_utils::thread as scoped;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn bird(name: &str) -> Bird {
    Bird::new(name, "brown", "20", "10")
}

fn sighting(name: &str, day: u32, minute: u32) -> Sighting {
    let at = NaiveDate::from_ymd_opt(2023, 5, day)
        .and_then(|d| d.and_hms_opt(9, minute, 0))
        .unwrap();
    Sighting::new(name, "Garden", at)
}

fn whole_year(pattern: &str) -> SightingsQuery {
    SightingsQuery::new(
        pattern,
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
    )
}

// checks that every sighting belongs to a stored bird and that no bird has duplicates
fn assert_consistent(catalog: &Catalog) {
    let birds: HashSet<String> = catalog.list_birds().into_iter().map(|b| b.name).collect();
    let state = catalog.dump();
    for (name, sightings) in &state.sightings {
        assert!(birds.contains(name), "orphan sightings for {}", name);
        let unique: HashSet<&Sighting> = sightings.iter().collect();
        assert_eq!(unique.len(), sightings.len(), "duplicate sightings for {}", name);
        assert!(sightings.iter().all(|s| &s.bird_name == name));
    }
}

#[test]
fn concurrent_distinct_birds_are_all_added() {
    let catalog = Catalog::new();
    let wg = WaitGroup::new();
    for t in 0..8 {
        let catalog = catalog.clone();
        let wg = wg.clone();
        thread::spawn(move || {
            for i in 0..100 {
                catalog.add_bird(bird(&format!("bird-{}-{}", t, i))).unwrap();
            }
            drop(wg);
        });
    }
    wg.wait();

    assert_eq!(catalog.bird_count(), 800);
    assert_eq!(catalog.list_birds().len(), 800);
}

#[test]
fn concurrent_same_bird_is_added_once() {
    let catalog = Catalog::new();
    let added = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);

    scoped::scope(|s| {
        for t in 0..16 {
            let catalog = &catalog;
            let added = &added;
            let rejected = &rejected;
            s.spawn(move |_| {
                match catalog.add_bird(Bird::new("Robin", format!("color-{}", t), "70", "14")) {
                    Ok(()) => added.fetch_add(1, Ordering::SeqCst),
                    Err(BirdsError::AlreadyExists(_)) => rejected.fetch_add(1, Ordering::SeqCst),
                    Err(e) => panic!("unexpected error {}", e),
                };
            });
        }
    })
    .unwrap();

    assert_eq!(added.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), 15);
    assert_eq!(catalog.bird_count(), 1);
}

#[test]
fn concurrent_identical_sightings_are_stored_once() {
    let catalog = Catalog::new();
    catalog.add_bird(bird("Robin")).unwrap();
    let added = AtomicUsize::new(0);

    scoped::scope(|s| {
        for _ in 0..16 {
            let catalog = &catalog;
            let added = &added;
            s.spawn(move |_| {
                if catalog.add_sighting(sighting("Robin", 1, 30)).is_ok() {
                    added.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(added.load(Ordering::SeqCst), 1);
    assert_eq!(catalog.sighting_count(), 1);
}

#[test]
fn remove_racing_add_sighting_leaves_no_orphans() {
    for round in 0..20 {
        let catalog = Catalog::new();
        catalog.add_bird(bird("Robin")).unwrap();

        scoped::scope(|s| {
            let adder = &catalog;
            s.spawn(move |_| {
                for minute in 0..50 {
                    // UnknownBird once the remove went through
                    let _ = adder.add_sighting(sighting("Robin", 1, minute));
                }
            });
            let remover = &catalog;
            s.spawn(move |_| {
                remover.remove("Robin").unwrap();
            });
        })
        .unwrap();

        assert_eq!(catalog.bird_count(), 0, "round {}", round);
        assert!(catalog.list_sightings(&whole_year("Robin")).unwrap().is_empty());
        assert!(matches!(catalog.remove("Robin"), Err(BirdsError::UnknownBird(_))));
        assert_consistent(&catalog);
    }
}

#[test]
fn snapshot_taken_during_mutations_is_a_valid_catalog() -> Result<()> {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let catalog = Catalog::new();

    let mut names: Vec<String> = (0..40).map(|i| format!("bird-{}", i)).collect();
    names.shuffle(&mut SmallRng::seed_from_u64(7));
    let names = Arc::new(names);

    scoped::scope(|s| {
        for t in 0..4usize {
            let catalog = &catalog;
            let names = Arc::clone(&names);
            s.spawn(move |_| {
                for (i, name) in names.iter().enumerate().filter(|(i, _)| i % 4 == t) {
                    catalog.add_bird(bird(name)).unwrap();
                    for day in 1..=3 {
                        catalog.add_sighting(sighting(name, day, 0)).unwrap();
                    }
                    if i % 3 == 0 {
                        catalog.remove(name).unwrap();
                    }
                }
            });
        }
        let catalog = &catalog;
        let dir = temp_dir.path();
        s.spawn(move |_| {
            for _ in 0..10 {
                write_snapshot(&catalog.dump(), dir).unwrap();
            }
        });
    })
    .unwrap();

    let reloaded = Catalog::from_state(load_snapshot(temp_dir.path())?);
    assert_consistent(&reloaded);
    for bird in reloaded.list_birds() {
        let seen = reloaded.list_sightings(&whole_year(&regex::escape(&bird.name)))?;
        assert!(seen.len() <= 3);
    }

    // the final state round trips exactly
    write_snapshot(&catalog.dump(), temp_dir.path())?;
    let state = load_snapshot(temp_dir.path())?;
    assert_eq!(state.birds.len(), catalog.bird_count());
    assert_eq!(state.sighting_count(), catalog.sighting_count());
    assert_eq!(state.birds.len(), 26);
    assert_eq!(state.sighting_count(), 26 * 3);
    Ok(())
}

#[test]
fn listing_is_monotone_in_pattern_and_period() -> Result<()> {
    let catalog = Catalog::new();
    for name in ["Robin", "Rook", "Wren"] {
        catalog.add_bird(bird(name))?;
        for day in [1, 10, 20] {
            catalog.add_sighting(sighting(name, day, 0))?;
        }
    }

    let narrow = catalog.list_sightings(&whole_year("Ro.*"))?;
    let wide = catalog.list_sightings(&whole_year(".*"))?;
    assert_eq!(narrow.len(), 6);
    assert_eq!(wide.len(), 9);
    assert!(narrow.iter().all(|s| wide.contains(s)));

    let may = |start: u32, end: u32| {
        SightingsQuery::new(
            ".*",
            NaiveDate::from_ymd_opt(2023, 5, start).unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, end).unwrap(),
        )
    };
    let short = catalog.list_sightings(&may(5, 15))?;
    let long = catalog.list_sightings(&may(1, 25))?;
    assert_eq!(short.len(), 3);
    assert!(short.iter().all(|s| long.contains(s)));
    Ok(())
}
