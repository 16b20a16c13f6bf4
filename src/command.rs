//! The request and response types exchanged between client and server, and their wire
//! encoding.
//!
//! On the wire every message is a single line of JSON followed by `\n`, an object with three
//! fields:
//!
//! ```text
//! {"action":"ADD_BIRD","object":{"name":"Robin",...},"comment":null}
//! ```
//!
//! The shape of `object` depends on `action`, so decoding first reads the action and then
//! deserializes the payload into the matching type. All three fields are always written,
//! missing fields are read as `null`.
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Bird, Sighting, SightingsQuery};
use crate::{BirdsError, Result};

/// The action tags of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// add a bird
    AddBird,
    /// add a sighting of an existing bird
    AddSighting,
    /// list all birds
    ListBirds,
    /// list the sightings matching a query
    ListSighting,
    /// remove a bird and its sightings
    Remove,
    /// shut the server down
    Quit,
}

impl Action {
    /// all actions, in the order they are presented to users
    pub const ALL: [Action; 6] = [
        Action::AddBird,
        Action::AddSighting,
        Action::ListBirds,
        Action::ListSighting,
        Action::Remove,
        Action::Quit,
    ];

    /// the client command line flag that selects this action
    pub fn flag(self) -> &'static str {
        match self {
            Action::AddBird => "-addbird",
            Action::AddSighting => "-addsighting",
            Action::ListBirds => "-listbirds",
            Action::ListSighting => "-listsightings",
            Action::Remove => "-remove",
            Action::Quit => "-quit",
        }
    }

    /// looks up the action selected by a command line flag, ignoring case
    pub fn from_flag(flag: &str) -> Option<Action> {
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.flag().eq_ignore_ascii_case(flag))
    }
}

/// A request sent from the client to the server, one per connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// add a new bird
    AddBird(Bird),
    /// add a sighting
    AddSighting(Sighting),
    /// list all birds
    ListBirds,
    /// list the sightings matching the query
    ListSightings(SightingsQuery),
    /// remove the bird with the given name
    Remove(String),
    /// stop the server
    Quit,
}

impl Request {
    /// the wire action of this request
    pub fn action(&self) -> Action {
        match self {
            Request::AddBird(_) => Action::AddBird,
            Request::AddSighting(_) => Action::AddSighting,
            Request::ListBirds => Action::ListBirds,
            Request::ListSightings(_) => Action::ListSighting,
            Request::Remove(_) => Action::Remove,
            Request::Quit => Action::Quit,
        }
    }

    /// true if this request asks the server to shut down
    pub fn is_quit(&self) -> bool {
        matches!(self, Request::Quit)
    }
}

/// The response Types that can be returned for any [`Request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// a human readable status, the outcome of mutations and all failures
    Comment(String),
    /// the result of LIST_BIRDS
    Birds(Vec<Bird>),
    /// the result of a successful LIST_SIGHTING
    Sightings(Vec<Sighting>),
    /// the (empty) answer to QUIT
    Empty,
}

impl Response {
    /// builds a comment response
    pub fn comment(comment: impl Into<String>) -> Self {
        Response::Comment(comment.into())
    }
}

/// The envelope as it appears on the wire
#[derive(Debug, Default, Serialize, Deserialize)]
struct Frame {
    #[serde(default)]
    action: Option<Action>,
    #[serde(default)]
    object: Option<Value>,
    #[serde(default)]
    comment: Option<String>,
}

impl Frame {
    fn new(action: Option<Action>, object: Option<Value>, comment: Option<String>) -> Self {
        Frame {
            action,
            object,
            comment,
        }
    }

    fn parse(line: &str) -> Result<Frame> {
        serde_json::from_str(line.trim_end_matches(&['\r', '\n'][..]))
            .map_err(|e| BirdsError::Decode(format!("malformed frame: {}", e)))
    }

    /// deserializes the object into the payload type selected by the action
    fn payload<T: serde::de::DeserializeOwned>(&mut self, action: Action) -> Result<T> {
        let object = self
            .object
            .take()
            .ok_or_else(|| BirdsError::Decode(format!("{:?} request without an object", action)))?;
        serde_json::from_value(object)
            .map_err(|e| BirdsError::Decode(format!("bad {:?} object: {}", action, e)))
    }
}

/// encodes `request` into a single line of JSON, without the trailing newline
pub fn encode_request(request: &Request) -> Result<String> {
    let object = match request {
        Request::AddBird(bird) => Some(serde_json::to_value(bird)?),
        Request::AddSighting(sighting) => Some(serde_json::to_value(sighting)?),
        Request::ListSightings(query) => Some(serde_json::to_value(query)?),
        Request::Remove(name) => Some(Value::String(name.clone())),
        Request::ListBirds | Request::Quit => None,
    };
    let frame = Frame::new(Some(request.action()), object, None);
    Ok(serde_json::to_string(&frame)?)
}

/// decodes a request line
///
/// # Errors
/// returns [`BirdsError::Decode`] if the line is not a frame, has no action, its object
/// does not have the shape required by the action, or it adds a bird without a name
pub fn decode_request(line: &str) -> Result<Request> {
    let mut frame = Frame::parse(line)?;
    let action = frame
        .action
        .ok_or_else(|| BirdsError::Decode("request without an action".to_string()))?;

    let request = match action {
        Action::AddBird => {
            let bird: Bird = frame.payload(action)?;
            if bird.name.is_empty() {
                return Err(BirdsError::Decode("ADD_BIRD with an empty bird name".to_string()));
            }
            Request::AddBird(bird)
        }
        Action::AddSighting => Request::AddSighting(frame.payload(action)?),
        Action::ListBirds => Request::ListBirds,
        Action::ListSighting => Request::ListSightings(frame.payload(action)?),
        Action::Remove => Request::Remove(frame.payload(action)?),
        Action::Quit => Request::Quit,
    };
    Ok(request)
}

/// encodes `response` into a single line of JSON, without the trailing newline
pub fn encode_response(response: &Response) -> Result<String> {
    let frame = match response {
        Response::Comment(comment) => Frame::new(None, None, Some(comment.clone())),
        Response::Birds(birds) => {
            Frame::new(Some(Action::ListBirds), Some(serde_json::to_value(birds)?), None)
        }
        Response::Sightings(sightings) => Frame::new(
            Some(Action::ListSighting),
            Some(serde_json::to_value(sightings)?),
            None,
        ),
        Response::Empty => Frame::default(),
    };
    Ok(serde_json::to_string(&frame)?)
}

/// decodes a response line
///
/// A listing action with a `null` object is the failure form of that listing, and decodes to
/// its comment.
pub fn decode_response(line: &str) -> Result<Response> {
    let mut frame = Frame::parse(line)?;
    let has_object = !matches!(frame.object, None | Some(Value::Null));

    let response = match (frame.action, has_object) {
        (Some(Action::ListBirds), true) => Response::Birds(frame.payload(Action::ListBirds)?),
        (Some(Action::ListSighting), true) => {
            Response::Sightings(frame.payload(Action::ListSighting)?)
        }
        _ => match frame.comment {
            Some(comment) => Response::Comment(comment),
            None => Response::Empty,
        },
    };
    Ok(response)
}

/// reads one request line from `reader`
///
/// Returns `Ok(None)` if the stream ends before a complete, newline terminated line arrived.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Option<Request>> {
    match read_frame_line(reader)? {
        Some(line) => decode_request(&line).map(Some),
        None => Ok(None),
    }
}

/// reads one response line from `reader`
///
/// Returns `Ok(None)` if the stream ends before a complete, newline terminated line arrived.
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Option<Response>> {
    match read_frame_line(reader)? {
        Some(line) => decode_response(&line).map(Some),
        None => Ok(None),
    }
}

/// writes `request` as one line and flushes the writer
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    write_frame_line(writer, &encode_request(request)?)
}

/// writes `response` as one line and flushes the writer
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_frame_line(writer, &encode_response(response)?)
}

fn read_frame_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.ends_with('\n') {
        Ok(Some(line))
    } else {
        Ok(None)
    }
}

fn write_frame_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
