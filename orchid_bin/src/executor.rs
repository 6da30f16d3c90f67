use std::collections::HashMap;
use std::fs;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use loam::{Options, Table};

use crate::errors::ExecutionError;
use crate::parser::Command;
use crate::worker::{Job, TableWorker};

/// File extension for table files inside the database directory.
pub const TABLE_SUFFIX: &str = "db";

/// The registry owns one worker per loaded table and routes commands to
/// them. Tables are independent; workers on different tables run
/// concurrently.
pub struct Registry {
    db_path: PathBuf,
    options: Options,
    workers: Mutex<HashMap<String, TableWorker>>,
}

impl Registry {
    pub fn new(db_path: PathBuf, options: Options) -> Registry {
        Registry {
            db_path,
            options,
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn table_file(&self, name: &str) -> PathBuf {
        self.db_path.join(format!("{name}.{TABLE_SUFFIX}"))
    }

    /// Opens (creating if needed) the named table and spawns its worker.
    /// A no-op when the table is already loaded.
    pub fn load_table(&self, name: &str) -> Result<(), ExecutionError> {
        let mut workers = self.workers.lock().unwrap();
        if workers.contains_key(name) {
            return Ok(());
        }

        let table = Table::open(self.table_file(name), self.options)?;
        workers.insert(name.to_string(), TableWorker::spawn(Arc::new(table)));
        crate::orchid_debug_log!("[Registry::load_table] loaded table: {name}");
        Ok(())
    }

    /// Stops and unloads the table's worker and removes its file from disk.
    /// Unknown tables are ignored.
    pub fn drop_table(&self, name: &str) -> Result<(), ExecutionError> {
        let removed = self.workers.lock().unwrap().remove(name);
        let Some(mut worker) = removed else {
            return Ok(());
        };

        worker.stop();
        if let Err(err) = worker.close_table() {
            eprintln!("close error for {name}: {err}");
        }
        fs::remove_file(self.table_file(name))?;
        crate::orchid_debug_log!("[Registry::drop_table] dropped table: {name}");
        Ok(())
    }

    /// Routes one parsed command. GET carries a clone of the originating
    /// connection so the table worker can answer on it.
    pub fn dispatch(&self, command: Command, conn: &TcpStream) -> Result<(), ExecutionError> {
        match command {
            Command::Make { table } => self.load_table(&table),
            Command::Drop { table } => self.drop_table(&table),
            Command::Get { table, key } => {
                let conn = conn.try_clone()?;
                self.submit(&table, Job::Get { key, conn })
            }
            Command::Put { table, key, value } => self.submit(&table, Job::Put { key, value }),
            Command::Del { table, key } => self.submit(&table, Job::Del { key }),
            // Shutdown is handled by the connection loop, not the registry.
            Command::Stop => Ok(()),
        }
    }

    fn submit(&self, table: &str, job: Job) -> Result<(), ExecutionError> {
        let workers = self.workers.lock().unwrap();
        let Some(worker) = workers.get(table) else {
            return Err(ExecutionError::TableNotLoaded(table.to_string()));
        };
        worker.submit(job)
    }

    pub fn loaded_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workers.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stops every worker and closes every table.
    pub fn close_all(&self) {
        let mut workers = self.workers.lock().unwrap();
        for (name, mut worker) in workers.drain() {
            worker.stop();
            if let Err(err) = worker.close_table() {
                eprintln!("close error for {name}: {err}");
            }
        }
    }
}
