use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use tracing::debug;
use crate::command::{read_response, write_request, Request, Response};
use crate::model::{Bird, Sighting, SightingsQuery};
use crate::{BirdsError, Result};

/// `BirdsClient` contains the functionality for communication with a [`BirdsServer`].
///
/// The server answers one request per connection, so every call opens a new connection to
/// the server, sends the request, reads the response and closes the connection again.
///
/// [`BirdsServer`]: crate::BirdsServer
#[derive(Debug, Clone)]
pub struct BirdsClient {
    addr: SocketAddr,
}

impl BirdsClient {

    /// creates a client for the server at the given `addr`, no connection is made yet
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| BirdsError::Parsing("no address to connect to".to_string()))?;
        Ok(BirdsClient { addr })
    }

    /// the address of the server
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// sends `request` on a new connection and returns the server's response
    ///
    /// # Errors
    /// returns an IO error if the server cannot be reached, and [`BirdsError::StringErr`] if
    /// the server closed the connection without answering
    pub fn send(&self, request: &Request) -> Result<Response> {
        let tcp_reader = TcpStream::connect(self.addr)?;
        let tcp_writer = tcp_reader.try_clone()?;
        let mut reader = BufReader::new(tcp_reader);
        let mut writer = BufWriter::new(tcp_writer);

        write_request(&mut writer, request)?;
        debug!("Request sent to {}: {:?}", self.addr, request);

        let response = read_response(&mut reader)?
            .ok_or_else(|| BirdsError::StringErr("the server closed the connection without a response".to_string()))?;
        debug!("Response received from {}: {:?}", self.addr, response);
        Ok(response)
    }

    /// adds a bird, returns the server's comment
    pub fn add_bird(&self, bird: Bird) -> Result<String> {
        expect_comment(self.send(&Request::AddBird(bird))?)
    }

    /// adds a sighting, returns the server's comment
    pub fn add_sighting(&self, sighting: Sighting) -> Result<String> {
        expect_comment(self.send(&Request::AddSighting(sighting))?)
    }

    /// lists every bird on the server
    pub fn list_birds(&self) -> Result<Vec<Bird>> {
        match self.send(&Request::ListBirds)? {
            Response::Birds(birds) => Ok(birds),
            other => Err(unexpected(other)),
        }
    }

    /// lists the sightings matching `query`
    ///
    /// # Errors
    /// `Err<BirdsError::StringErr>` carrying the server's comment if the query was rejected,
    /// e.g. because of a bad pattern
    pub fn list_sightings(&self, query: SightingsQuery) -> Result<Vec<Sighting>> {
        match self.send(&Request::ListSightings(query))? {
            Response::Sightings(sightings) => Ok(sightings),
            Response::Comment(comment) => Err(BirdsError::StringErr(comment)), // re-throwing error here
            other => Err(unexpected(other)),
        }
    }

    /// removes a bird and its sightings, returns the server's comment
    pub fn remove(&self, name: impl Into<String>) -> Result<String> {
        expect_comment(self.send(&Request::Remove(name.into()))?)
    }

    /// asks the server to shut down
    pub fn quit(&self) -> Result<()> {
        self.send(&Request::Quit).map(|_| ())
    }
}

fn expect_comment(response: Response) -> Result<String> {
    match response {
        Response::Comment(comment) => Ok(comment),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> BirdsError {
    BirdsError::StringErr(format!("unexpected response from server: {:?}", response))
}
