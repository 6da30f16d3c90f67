use std::path::{Path, PathBuf};

use clap::Parser;
use loam::Options;

/// Orchid runtime options.
#[derive(Parser, Debug)]
#[command(
    name = "orchid",
    version,
    about = "OrchidDB key-value database server"
)]
pub struct Args {
    /// Path to place database files. Ideally is an empty directory.
    /// Defaults to the executable's directory.
    #[arg(long = "path")]
    pub path: Option<PathBuf>,

    /// Which address the server uses for listening.
    #[arg(long = "addr", default_value = "127.0.0.1")]
    pub addr: String,

    /// Which port the server uses for listening.
    #[arg(long = "port", default_value_t = 6000)]
    pub port: u16,

    /// Size in bytes for a single database page. Defaults to the OS page
    /// size.
    #[arg(long = "page-size")]
    pub page_size: Option<usize>,

    /// Minimum percentage a node must be filled to before consolidation.
    #[arg(long = "node-min", default_value_t = 0.5)]
    pub node_min: f32,

    /// Maximum percentage a node may be filled to before splitting.
    #[arg(long = "node-max", default_value_t = 0.95)]
    pub node_max: f32,
}

/// Immutable server configuration built once at startup from the CLI flags.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub addr: String,
    pub port: u16,
    pub options: Options,
}

impl ServerConfig {
    pub fn from_args(args: Args) -> ServerConfig {
        let mut options = Options::default();
        if let Some(page_size) = args.page_size {
            options.page_size = page_size;
        }
        options.min_fill_percent = args.node_min;
        options.max_fill_percent = args.node_max;

        ServerConfig {
            db_path: args.path.unwrap_or_else(exec_directory),
            addr: args.addr,
            port: args.port,
            options,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// The directory the executable runs from, used as the default database
/// path when one is not provided.
fn exec_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
