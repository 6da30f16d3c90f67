mod common;

use std::path::Path;
use std::time::Duration;

use serial_test::serial;
use tempfile::tempdir;

use common::{pick_free_port, start_server, stop_server, LineClient};

fn wal_files(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .expect("read db dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "wal"))
        .collect()
}

/// Kill after the WAL is durable but before the table file is touched:
/// restarting must replay the log and surface the write.
#[test]
#[serial]
fn crash_after_wal_write_recovers_the_put() {
    let dir = tempdir().expect("tempdir");

    // A clean baseline commit, so table creation is already on disk.
    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, None);
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    client.send("MAKE(plants)");
    client.send("PUT(plants, k1, v1)");
    assert_eq!(client.request("GET(plants, k1)"), "v1");
    stop_server(&mut server);

    // The doomed write: commit halts after sealing the WAL.
    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, Some("txn.commit.after_wal"));
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    client.send("PUT(plants, k2, v2)");
    // The failed commit left in-memory and on-disk state at the pre-PUT
    // image, with the transaction parked in its WAL.
    assert_eq!(client.request("GET(plants, k2)"), "nil");
    stop_server(&mut server);
    assert_eq!(wal_files(dir.path()).len(), 1);

    // Restart clean: recovery replays the sealed WAL before serving.
    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, None);
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    assert_eq!(client.request("GET(plants, k2)"), "v2");
    assert_eq!(client.request("GET(plants, k1)"), "v1");
    assert!(wal_files(dir.path()).is_empty());
    stop_server(&mut server);
}

/// Kill before the WAL is written: restarting must show the pre-operation
/// state, with nothing left behind.
#[test]
#[serial]
fn crash_before_wal_write_preserves_prior_state() {
    let dir = tempdir().expect("tempdir");

    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, None);
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    client.send("MAKE(plants)");
    client.send("PUT(plants, k1, v1)");
    assert_eq!(client.request("GET(plants, k1)"), "v1");
    stop_server(&mut server);

    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, Some("txn.commit.before_wal"));
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    client.send("PUT(plants, k2, v2)");
    assert_eq!(client.request("GET(plants, k2)"), "nil");
    stop_server(&mut server);
    assert!(wal_files(dir.path()).is_empty());

    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, None);
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    assert_eq!(client.request("GET(plants, k2)"), "nil");
    assert_eq!(client.request("GET(plants, k1)"), "v1");
    stop_server(&mut server);
}

/// Kill after replay but before the WAL is removed: the replayed log is
/// still on disk and recovery must re-apply it idempotently.
#[test]
#[serial]
fn crash_before_wal_removal_replays_idempotently() {
    let dir = tempdir().expect("tempdir");

    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, None);
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    client.send("MAKE(plants)");
    client.send("PUT(plants, k1, v1)");
    assert_eq!(client.request("GET(plants, k1)"), "v1");
    stop_server(&mut server);

    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, Some("txn.commit.before_wal_remove"));
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    client.send("PUT(plants, k2, v2)");
    // The pages already reached the table file; only the cleanup was lost,
    // so the write is visible and its WAL is still on disk.
    assert_eq!(client.request("GET(plants, k2)"), "v2");
    stop_server(&mut server);
    assert_eq!(wal_files(dir.path()).len(), 1);

    let port = pick_free_port();
    let mut server = start_server(dir.path(), port, None);
    let mut client = LineClient::connect_with_retry(port, Duration::from_secs(10));
    assert_eq!(client.request("GET(plants, k2)"), "v2");
    assert!(wal_files(dir.path()).is_empty());
    stop_server(&mut server);
}
