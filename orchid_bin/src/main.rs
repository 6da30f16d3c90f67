//! The main entry point for the OrchidDB server.
//!
//! Parses command-line arguments and starts the server. Flag errors and
//! startup failures (such as a failed bind) exit with status 2.

use clap::Parser;

use orchid_bin::cli::{Args, ServerConfig};

fn main() {
    let args = Args::parse();
    let config = ServerConfig::from_args(args);

    if let Err(err) = orchid_bin::run_server(config) {
        eprintln!("startup failure: {err}");
        std::process::exit(2);
    }
}
