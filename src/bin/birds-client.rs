//! The birds-client executable sends a single request to a birds-server on the local host.
//!
//! `birds-client <ACTION> [-serverPort PORT]`
//!
//! Exactly one action flag must be given:
//!
//!     -addbird        add a bird, its name, color, weight and height are read from stdin
//!     -addsighting    add a sighting, the bird name, location and 'yyyy-MM-dd HH:mm' date/time are read from stdin
//!     -listbirds      print all birds
//!     -listsightings  print the sightings matching a name pattern and a period read from stdin
//!     -remove         remove a bird and its sightings, the name is read from stdin
//!     -quit           shut the server down
//!
//! -serverPort sets the port of the server, 1..65535, defaults to 3000.
//!
//! Input that is rejected locally (empty bird name, malformed dates) is reported on stderr
//! without contacting the server, and the client exits with a non-zero code.

use std::env;
use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use std::process::exit;
use clap::{crate_version, App, Arg, ArgGroup, ArgMatches};
use birds::config::{normalize_flags, parse_port, DEFAULT_PORT};
use birds::model::{parse_date, parse_date_time, DATE_INPUT_FORMAT};
use birds::{Action, Bird, BirdsClient, BirdsError, Request, Response, Result, Sighting, SightingsQuery};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const SERVER_PORT: &str = "serverPort";

const ACTION_FLAGS: [&str; 6] = ["addbird", "addsighting", "listbirds", "listsightings", "remove", "quit"];

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    port: u16,
    action: Action,
}

impl Opt {
    /// validates the command line, returns `Ok(None)` if no action was chosen
    ///
    /// # Errors
    /// returns [`BirdsError::Parsing`] if the port is invalid
    fn build(matches: &ArgMatches) -> Result<Option<Opt>> {
        let port = match matches.value_of(SERVER_PORT) {
            Some(port) => parse_port(port)?,
            None => DEFAULT_PORT,
        };
        let action = ACTION_FLAGS
            .iter()
            .find(|flag| matches.is_present(flag))
            .and_then(|flag| Action::from_flag(&format!("-{}", flag)));

        Ok(action.map(|action| Opt { port, action }))
    }
}

fn main() {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let mut known: Vec<&str> = ACTION_FLAGS.to_vec();
    known.push(SERVER_PORT);

    let matches = App::new("birds-client")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("client of the multi-threaded bird sightings catalog")
        .args(&[
            Arg::with_name("addbird").long("addbird").help("Add a bird"),
            Arg::with_name("addsighting").long("addsighting").help("Add a sighting of a bird"),
            Arg::with_name("listbirds").long("listbirds").help("List all birds"),
            Arg::with_name("listsightings").long("listsightings").help("List the sightings matching a pattern and period"),
            Arg::with_name("remove").long("remove").help("Remove a bird and its sightings"),
            Arg::with_name("quit").long("quit").help("Shut the server down"),
        ])
        .group(ArgGroup::with_name("action")
            .args(&ACTION_FLAGS)
            .multiple(false))
        .arg(Arg::with_name(SERVER_PORT)
            .long(SERVER_PORT)
            .value_name("PORT")
            .help("sets the port of the server to connect to"))
        .get_matches_from(normalize_flags(env::args_os(), &known));

    let opt = match Opt::build(&matches) {
        Ok(Some(opt)) => opt,
        Ok(None) => {
            eprintln!("No action was chosen");
            exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    };

    if let Err(e) = run(opt) {
        match e {
            BirdsError::BadFormat(_) => eprintln!("ERROR: Date and/or time entered in a wrong format"),
            e => eprintln!("{}", e),
        }
        exit(1);
    }
}

/// asks for the request's parameters, sends it to the server and prints the response
fn run(opt: Opt) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let request = prepare_request(opt.action, &mut input)?;

    let client = BirdsClient::new((Ipv4Addr::LOCALHOST, opt.port))?;
    let response = client.send(&request)?;
    print_response(opt.action, response)
}

/// interactively reads the parameters of the request for `action` from `input`
fn prepare_request<R: BufRead>(action: Action, input: &mut R) -> Result<Request> {
    let request = match action {
        Action::AddBird => {
            println!("You selected an option to add information about a bird.\n");
            let name = ask_name(input)?;
            let color = ask(input, "Please enter color of the bird and then press ENTER: ")?;
            let weight = ask(input, "Please enter weight of the bird and then press ENTER: ")?;
            let height = ask(input, "Please enter height of the bird and then press ENTER: ")?;
            Request::AddBird(Bird::new(name, color, weight, height))
        }
        Action::AddSighting => {
            println!("You selected an option to add information about a sighting.\n");
            let name = ask_name(input)?;
            let location = ask(input, "Please enter a location and then press ENTER: ")?;
            let at = ask(input, "Please enter date and time in a format 'yyyy-MM-dd HH:mm' and then press ENTER: ")?;
            Request::AddSighting(Sighting::new(name, location, parse_date_time(&at)?))
        }
        Action::ListBirds => {
            println!("You selected an option to see a list of the birds.\n");
            Request::ListBirds
        }
        Action::ListSighting => {
            println!("You selected an option to see a list of the sightings.\n");
            let pattern = ask(input, "Please enter name of the bird as a pattern and then press ENTER: ")?;
            let start = ask(input, "Please enter start date of a period you are looking for the sights (please use format yyyy-MM-dd) and then press ENTER: ")?;
            let start = parse_date(&start)?;
            let end = ask(input, "Please enter end date of a period you are looking for the sights (please use format yyyy-MM-dd) and then press ENTER: ")?;
            let end = parse_date(&end)?;
            Request::ListSightings(SightingsQuery::new(pattern, start, end))
        }
        Action::Remove => {
            println!("You selected an option to remove information about a bird.\n");
            Request::Remove(ask(input, "Please enter name of the bird and then press ENTER: ")?)
        }
        Action::Quit => {
            println!("You selected an option to shutdown the server.\n");
            Request::Quit
        }
    };
    Ok(request)
}

fn ask_name<R: BufRead>(input: &mut R) -> Result<String> {
    let name = ask(input, "Please enter name of the bird and then press ENTER: ")?;
    if name.is_empty() {
        return Err(BirdsError::StringErr("Name of a bird cannot be empty.".to_string()));
    }
    Ok(name)
}

/// prints `prompt` and reads one line, without its line ending. The end of input reads as
/// an empty line.
fn ask<R: BufRead>(input: &mut R, prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn print_response(action: Action, response: Response) -> Result<()> {
    match (action, response) {
        (Action::ListBirds, Response::Birds(mut birds)) => {
            birds.sort_by(|a, b| a.name.cmp(&b.name));
            println!("A list of the birds:\n");
            println!("| NAME | COLOR | WEIGHT | HEIGHT |");
            for b in &birds {
                println!("| {} | {} | {} | {} |", b.name, b.color, b.weight, b.height);
            }
            println!("\nTOTAL: {}", birds.len());
        }
        (Action::ListSighting, Response::Sightings(mut sightings)) => {
            sightings.sort_by(|a, b| {
                a.bird_name
                    .cmp(&b.bird_name)
                    .then(a.sighting_date_time.cmp(&b.sighting_date_time))
            });
            println!("A list of the sightings:\n");
            println!("| BIRD NAME | DATE |");
            for s in &sightings {
                println!("| {} | {} |", s.bird_name, s.sighting_date_time.format(DATE_INPUT_FORMAT));
            }
        }
        (Action::ListSighting, Response::Comment(comment)) => eprintln!("{}", comment),
        (Action::Quit, _) => println!("The server is shutting down"),
        (_, Response::Comment(comment)) => println!("\n{}", comment),
        (_, other) => {
            return Err(BirdsError::StringErr(format!("unexpected response from server: {:?}", other)))
        }
    }
    Ok(())
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        // only warnings and errors, stdout belongs to the prompts and tables
        .with_max_level(Level::WARN)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting tracing default subscriber failed: {}", e);
    }
}
