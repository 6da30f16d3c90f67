use std::io::Write;
use std::net::TcpStream;
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread;

use bytes::{BufMut, BytesMut};
use loam::Table;

use crate::errors::ExecutionError;

/// How many commands may queue per table before senders block.
const WORKER_QUEUE_DEPTH: usize = 128;

/// One unit of work for a table worker. GET carries the originating
/// connection so the worker can answer it directly.
pub enum Job {
    Get { key: String, conn: TcpStream },
    Put { key: String, value: String },
    Del { key: String },
}

/// A table worker runs a loop over a bounded channel on its own thread and
/// is the primary interface to the underlying table. The server has n
/// threads where n is the number of loaded tables, and every command for a
/// table is executed in queue order.
pub struct TableWorker {
    table: Arc<Table>,
    sender: Option<SyncSender<Job>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TableWorker {
    pub fn spawn(table: Arc<Table>) -> TableWorker {
        let (sender, receiver) = mpsc::sync_channel::<Job>(WORKER_QUEUE_DEPTH);

        let worker_table = Arc::clone(&table);
        let handle = thread::spawn(move || {
            for job in receiver {
                if let Err(err) = execute_job(&worker_table, job) {
                    eprintln!("worker error for table {}: {err}", worker_table.name());
                }
            }
        });

        TableWorker {
            table,
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Queues a job for the worker, blocking when the queue is full.
    pub fn submit(&self, job: Job) -> Result<(), ExecutionError> {
        let Some(sender) = &self.sender else {
            return Err(ExecutionError::WorkerStopped(self.table.name().to_string()));
        };
        sender
            .send(job)
            .map_err(|_| ExecutionError::WorkerStopped(self.table.name().to_string()))
    }

    /// Closes the queue and waits for the loop to drain what was already
    /// accepted.
    pub fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn close_table(&self) -> std::io::Result<()> {
        self.table.close()
    }
}

impl Drop for TableWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn execute_job(table: &Table, job: Job) -> Result<(), ExecutionError> {
    match job {
        Job::Get { key, mut conn } => {
            let item = table.get(key.as_bytes())?;

            let mut response = BytesMut::new();
            match item {
                Some(item) => response.put_slice(&item.value),
                None => response.put_slice(b"nil"),
            }
            response.put_u8(b'\n');

            conn.write_all(&response)?;
            Ok(())
        }
        Job::Put { key, value } => {
            table.put(key.as_bytes(), value.as_bytes())?;
            Ok(())
        }
        Job::Del { key } => {
            table.del(key.as_bytes())?;
            Ok(())
        }
    }
}
