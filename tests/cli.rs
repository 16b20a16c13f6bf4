use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{self, Child, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// a birds-server process that is killed if the test ends before it exits by itself
struct ServerProcess {
    child: Child,
    port: u16,
}

impl ServerProcess {
    fn start(data_dir: &Path, port: u16) -> ServerProcess {
        let child = process::Command::new(assert_cmd::cargo::cargo_bin("birds-server"))
            .arg("-port")
            .arg(port.to_string())
            .arg("-data")
            .arg(data_dir)
            .args(&["-proc_count", "2"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("unable to start birds-server");
        let server = ServerProcess { child, port };
        server.wait_until_listening();
        server
    }

    fn wait_until_listening(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while TcpStream::connect(("127.0.0.1", self.port)).is_err() {
            assert!(Instant::now() < deadline, "server did not start listening");
            thread::sleep(Duration::from_millis(50));
        }
    }

    fn wait_for_exit(&mut self) -> process::ExitStatus {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status;
            }
            assert!(Instant::now() < deadline, "server did not exit");
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|addr| addr.port())
        .unwrap()
}

fn client(port: u16, action: &str, stdin: &str) -> assert_cmd::assert::Assert {
    Command::cargo_bin("birds-client")
        .unwrap()
        .arg(action)
        .arg("-serverPort")
        .arg(port.to_string())
        .write_stdin(stdin)
        .assert()
}

#[test]
fn client_without_action_fails() {
    Command::cargo_bin("birds-client")
        .unwrap()
        .assert()
        .failure()
        .stderr(contains("No action was chosen"));
}

#[test]
fn client_with_two_actions_fails() {
    Command::cargo_bin("birds-client")
        .unwrap()
        .args(&["-addbird", "-remove"])
        .assert()
        .failure();
}

#[test]
fn client_rejects_invalid_port() {
    Command::cargo_bin("birds-client")
        .unwrap()
        .args(&["-listbirds", "-serverPort", "70000"])
        .assert()
        .failure()
        .stderr(contains("Server port should be in a range 1..65535"));
}

#[test]
fn client_rejects_empty_bird_name_without_a_server() {
    client(free_port(), "-addbird", "\n")
        .failure()
        .stderr(contains("Name of a bird cannot be empty."));
}

#[test]
fn client_rejects_bad_date_without_a_server() {
    client(free_port(), "-addsighting", "Robin\nGarden\n01/05/2023 9:30\n")
        .failure()
        .stderr(contains("ERROR: Date and/or time entered in a wrong format"));

    client(free_port(), "-listsightings", "Ro.*\n2023-04-01\nJune\n")
        .failure()
        .stderr(contains("ERROR: Date and/or time entered in a wrong format"));
}

#[test]
fn client_fails_if_server_is_unreachable() {
    client(free_port(), "-listbirds", "").failure();
}

#[test]
fn server_rejects_invalid_options() {
    Command::cargo_bin("birds-server")
        .unwrap()
        .args(&["-proc_count", "0"])
        .assert()
        .failure()
        .stderr(contains("proc_count parameter should be a positive value"));

    Command::cargo_bin("birds-server")
        .unwrap()
        .args(&["-port", "0"])
        .assert()
        .failure()
        .stderr(contains("Server port should be in a range 1..65535"));
}

#[test]
fn client_server_session() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let port = free_port();
    let mut server = ServerProcess::start(temp_dir.path(), port);

    client(port, "-addbird", "Robin\nred\n70\n14\n")
        .success()
        .stdout(contains("Bird Robin successfully added to the database"));
    client(port, "-ADDBIRD", "Robin\nred\n70\n14\n")
        .success()
        .stdout(contains("FAILURE: Bird Robin already exists"));

    client(port, "-addsighting", "Robin\nGarden\n2023-05-01 09:30\n")
        .success()
        .stdout(contains("Sighting for Robin successfully added to the database"));
    client(port, "-addsighting", "Robin\nGarden\n2023-05-01 09:30\n")
        .success()
        .stdout(contains("FAILURE: Sighting with such parameters already exists"));

    client(port, "-listsightings", "Ro.*\n2023-04-01\n2023-06-01\n")
        .success()
        .stdout(contains("A list of the sightings:").and(contains("| Robin | 2023-05-01 |")));
    client(port, "-listsightings", "Ro(\n2023-04-01\n2023-06-01\n")
        .success()
        .stderr(contains("Pattern error: "));

    client(port, "-listbirds", "")
        .success()
        .stdout(contains("| Robin | red | 70 | 14 |").and(contains("TOTAL: 1")));

    client(port, "-remove", "Robin\n")
        .success()
        .stdout(contains("Bird Robin successfully removed from database"));
    client(port, "-listbirds", "")
        .success()
        .stdout(contains("TOTAL: 0").and(contains("Robin").not()));

    client(port, "-addbird", "Wren\nbrown\n10\n9\n").success();
    client(port, "-quit", "").success();
    assert!(server.wait_for_exit().success());

    // a restarted server reads the final snapshot
    let _server = ServerProcess::start(temp_dir.path(), port);
    client(port, "-listbirds", "")
        .success()
        .stdout(contains("| Wren | brown | 10 | 9 |").and(contains("TOTAL: 1")));
    client(port, "-quit", "").success();
}
