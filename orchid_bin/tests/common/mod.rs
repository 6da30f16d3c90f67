use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

/// The page size every spawned server runs with, so crafted WAL fixtures
/// are valid on any host.
pub const TEST_PAGE_SIZE: usize = 4096;

pub fn server_binary_path() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{manifest_dir}/../target/debug/orchid_bin")
}

pub fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

pub fn start_server(db_path: &Path, port: u16, failpoints: Option<&str>) -> Child {
    let mut cmd = Command::new(server_binary_path());
    cmd.arg("--path")
        .arg(db_path)
        .arg("--addr")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--page-size")
        .arg(TEST_PAGE_SIZE.to_string());
    if let Some(points) = failpoints {
        cmd.env("ORCHID_FAILPOINTS", points);
    }
    cmd.spawn().expect("failed to start server")
}

pub fn stop_server(server: &mut Child) {
    let _ = server.kill();
    let _ = server.wait();
}

/// Waits for the server process to exit on its own (after a STOP command).
pub fn wait_for_exit(server: &mut Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match server.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {
                if Instant::now() >= deadline {
                    return false;
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => return false,
        }
    }
}

/// A newline-framed protocol client.
pub struct LineClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl LineClient {
    pub fn connect_with_retry(port: u16, timeout: Duration) -> LineClient {
        let addr = format!("127.0.0.1:{port}");
        let deadline = Instant::now() + timeout;
        loop {
            match TcpStream::connect(&addr) {
                Ok(stream) => {
                    let reader = BufReader::new(stream.try_clone().expect("clone stream"));
                    return LineClient { stream, reader };
                }
                Err(err) => {
                    if Instant::now() >= deadline {
                        panic!("failed to connect to {addr} in time: {err}");
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }

    /// Sends one command line. PUT, DEL, MAKE and DROP have no response.
    pub fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .expect("write command");
    }

    /// Reads one newline-framed response.
    pub fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Sends a command that produces a response (GET, or anything
    /// malformed) and returns the response line.
    pub fn request(&mut self, line: &str) -> String {
        self.send(line);
        self.read_line()
    }
}
