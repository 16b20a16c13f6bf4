//! Turns a decoded [`Request`] into a [`Response`] by running it against a [`BirdsEngine`].
//!
//! Every outcome, including every failure, becomes a response. Nothing in here performs I/O.
use crate::command::{Request, Response};
use crate::engine::BirdsEngine;
use crate::BirdsError;

/// runs `request` against `engine` and builds the response to send back to the client.
///
/// A [`Request::Quit`] gets an [`Response::Empty`] answer, stopping the server is up to the
/// caller (see [`Request::is_quit`]).
pub fn handle<E: BirdsEngine>(engine: &E, request: Request) -> Response {
    match request {
        Request::AddBird(bird) => {
            let name = bird.name.clone();
            match engine.add_bird(bird) {
                Ok(()) => Response::comment(format!("Bird {} successfully added to the database", name)),
                Err(e) => failure(e),
            }
        }
        Request::AddSighting(sighting) => {
            let name = sighting.bird_name.clone();
            match engine.add_sighting(sighting) {
                Ok(()) => Response::comment(format!(
                    "Sighting for {} successfully added to the database",
                    name
                )),
                Err(BirdsError::UnknownBird(name)) => Response::comment(format!(
                    "FAILURE: Sighting was not added because Bird {} does not exist",
                    name
                )),
                Err(e) => failure(e),
            }
        }
        Request::ListBirds => Response::Birds(engine.list_birds()),
        Request::ListSightings(query) => match engine.list_sightings(&query) {
            Ok(sightings) => Response::Sightings(sightings),
            Err(e) => failure(e),
        },
        Request::Remove(name) => match engine.remove(&name) {
            Ok(()) => Response::comment(format!("Bird {} successfully removed from database", name)),
            Err(e) => failure(e),
        },
        Request::Quit => Response::Empty,
    }
}

/// the comment sent to the client for a failed request
fn failure(e: BirdsError) -> Response {
    let comment = match e {
        BirdsError::AlreadyExists(name) => format!("FAILURE: Bird {} already exists", name),
        BirdsError::UnknownBird(name) => format!("FAILURE: Bird {} does not exist", name),
        BirdsError::DuplicateSighting => "FAILURE: Sighting with such parameters already exists".to_string(),
        BirdsError::BadPattern(msg) => format!("Pattern error: {}", msg),
        other => format!("FAILURE: {}", other),
    };
    Response::Comment(comment)
}
