use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::executor::Registry;
use crate::parser::{self, Command};

/// A process-wide cancellation token observed by the accept loop. Triggering
/// it also pokes the listener with a throwaway connection so a blocked
/// accept wakes up and sees the flag.
pub struct ShutdownToken {
    flag: AtomicBool,
    addr: SocketAddr,
}

impl ShutdownToken {
    fn new(addr: SocketAddr) -> Self {
        Self {
            flag: AtomicBool::new(false),
            addr,
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    shutdown: Arc<ShutdownToken>,
}

impl Server {
    pub fn bind(addr: &str, registry: Arc<Registry>) -> io::Result<Server> {
        let listener = TcpListener::bind(addr)?;
        let shutdown = Arc::new(ShutdownToken::new(listener.local_addr()?));
        Ok(Server {
            listener,
            registry,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the shutdown token fires, handling each on
    /// its own thread.
    pub fn run(&self) -> io::Result<()> {
        println!("OrchidDB is listening on {}", self.listener.local_addr()?);

        for stream in self.listener.incoming() {
            if self.shutdown.is_triggered() {
                break;
            }

            match stream {
                Ok(stream) => {
                    let registry = Arc::clone(&self.registry);
                    let shutdown = Arc::clone(&self.shutdown);
                    thread::spawn(move || {
                        if let Err(err) = handle_connection(stream, &registry, &shutdown) {
                            eprintln!("connection error: {err}");
                        }
                    });
                }
                Err(err) => eprintln!("accept error: {err}"),
            }
        }

        println!("OrchidDB shut down.");
        Ok(())
    }
}

/// Reads newline-framed commands off the connection, parses each, and hands
/// it to the execution layer. Unparsable lines are answered with a parse
/// error; execution failures are logged and the connection keeps serving.
fn handle_connection(
    stream: TcpStream,
    registry: &Registry,
    shutdown: &ShutdownToken,
) -> io::Result<()> {
    crate::orchid_debug_log!(
        "[handle_connection] new connection from: {}",
        stream.peer_addr()?
    );

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let raw_query = line.trim_end_matches(['\r', '\n']);

        let command = match parser::parse_command(raw_query) {
            Ok(command) => command,
            Err(_) => {
                (&stream).write_all(b"ERR: parseError\n")?;
                continue;
            }
        };
        crate::orchid_debug_log!("[handle_connection] parsed command: {command}");

        if command == Command::Stop {
            registry.close_all();
            shutdown.trigger();
            return Ok(());
        }

        if let Err(err) = registry.dispatch(command, &stream) {
            eprintln!("execution error: {err}");
        }
    }
}
