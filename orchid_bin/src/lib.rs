//! The OrchidDB server: a line-oriented TCP front end over the loam storage
//! engine. Clients issue `MAKE`/`DROP`/`GET`/`PUT`/`DEL`/`STOP` commands
//! naming a table; each loaded table is serviced by its own worker thread.

use std::io;
use std::sync::Arc;

pub mod banner;
pub mod cli;
pub mod errors;
pub mod executor;
pub mod parser;
pub mod server;
pub mod startup;
pub mod worker;

use cli::ServerConfig;
use executor::Registry;
use server::Server;

pub fn debug_logs_enabled() -> bool {
    std::env::var_os("ORCHID_DEBUG_LOG").is_some()
}

#[macro_export]
macro_rules! orchid_debug_log {
    ($($arg:tt)*) => {
        if $crate::debug_logs_enabled() {
            println!($($arg)*);
        }
    };
}

/// Boots the server: banner, directory bootstrap, WAL recovery sweep,
/// worker preloading, then the accept loop. Returns when a `STOP()` command
/// shuts the server down.
pub fn run_server(config: ServerConfig) -> io::Result<()> {
    banner::print_startup_text();

    startup::create_database_directory(&config.db_path)?;
    startup::perform_recovery_check(&config.db_path, &config.options);

    let registry = Arc::new(Registry::new(config.db_path.clone(), config.options));
    startup::load_workers(&registry, &config.db_path);

    let server = Server::bind(&config.listen_addr(), registry)?;
    server.run()
}
