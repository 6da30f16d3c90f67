use std::fmt;
use std::io;

/// Errors surfaced by the dispatch and worker layers. Engine failures are
/// logged and the worker continues servicing the next command; engine state
/// stays consistent because a failed commit leaves an incomplete WAL that
/// recovery discards.
#[derive(Debug)]
pub enum ExecutionError {
    Io(io::Error),
    TableNotLoaded(String),
    WorkerStopped(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Io(err) => write!(f, "io error: {err}"),
            ExecutionError::TableNotLoaded(table) => {
                write!(f, "no worker loaded for table: {table} (did you MAKE(table)?)")
            }
            ExecutionError::WorkerStopped(table) => {
                write!(f, "worker for table {table} has stopped")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<io::Error> for ExecutionError {
    fn from(err: io::Error) -> Self {
        ExecutionError::Io(err)
    }
}
