use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use loam::pager::Pager;
use loam::{wal, Options};

use crate::executor::{Registry, TABLE_SUFFIX};

/// Creates the database directory if it does not exist.
pub fn create_database_directory(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Checks every table file for leftover WAL files and replays the valid
/// ones. Runs before any table is opened for service, so recovered pages
/// are visible to the meta and freelist reads that follow.
pub fn perform_recovery_check(db_path: &Path, options: &Options) {
    let Ok(tables) = table_paths(db_path) else {
        return;
    };

    for table_path in tables {
        let Some(stem) = table_path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        for wal_path in table_wal_paths(db_path, stem) {
            let pager = match Pager::open(&table_path, options.page_size) {
                Ok(pager) => pager,
                Err(err) => {
                    eprintln!("cannot open {} for recovery: {err}", table_path.display());
                    break;
                }
            };

            if let Err(err) = wal::recover_from_log(&wal_path, &pager) {
                // The WAL is kept for the next startup to retry.
                eprintln!("WAL replay failed for {}: {err}", wal_path.display());
            }
        }
    }
}

/// Loads a worker for every table file already in the database directory.
pub fn load_workers(registry: &Registry, db_path: &Path) {
    let Ok(tables) = table_paths(db_path) else {
        return;
    };

    for table_path in tables {
        let Some(stem) = table_path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if let Err(err) = registry.load_table(stem) {
            eprintln!("could not load table {stem}: {err}");
        }
    }
}

/// Absolute paths of the `.db` files in the database directory, sorted.
fn table_paths(db_path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut tables: Vec<PathBuf> = fs::read_dir(db_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == TABLE_SUFFIX))
        .collect();
    tables.sort();
    Ok(tables)
}

/// WAL files belonging to the named table, oldest first. WAL names are
/// `<stem>_<stamp>.wal` where the stamp starts with the year, which keeps a
/// table named `a` from claiming the logs of a table named `a_b`.
fn table_wal_paths(db_path: &Path, stem: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(db_path) else {
        return Vec::new();
    };

    let prefix = format!("{stem}_");
    let mut wals: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "wal"))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(&prefix))
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .collect();
    wals.sort();
    wals
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam::Table;
    use tempfile::tempdir;

    #[test]
    fn recovery_check_replays_a_sealed_wal() {
        let dir = tempdir().unwrap();
        let options = Options::new(256, 0.5, 0.95);

        // A committed table, then a WAL written without being applied.
        let table_path = dir.path().join("plants.db");
        let table = Table::open(&table_path, options).unwrap();
        drop(table);

        let armed = loam::failpoint::arm("txn.commit.after_wal");
        let table = Table::open(&table_path, options).unwrap();
        assert!(table.put(b"orchid", b"purple").is_err());
        drop(armed);
        drop(table);

        perform_recovery_check(dir.path(), &options);

        let table = Table::open(&table_path, options).unwrap();
        assert_eq!(table.get(b"orchid").unwrap().unwrap().value, b"purple");
        assert!(table_wal_paths(dir.path(), "plants").is_empty());
    }

    #[test]
    fn wal_matching_does_not_cross_table_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_b_2099-01-01T00-00-00.000000000Z-0001.wal"), b"").unwrap();

        assert!(table_wal_paths(dir.path(), "a").is_empty());
        assert_eq!(table_wal_paths(dir.path(), "a_b").len(), 1);
    }

    #[test]
    fn load_workers_picks_up_existing_tables() {
        let dir = tempdir().unwrap();
        let options = Options::new(256, 0.5, 0.95);

        drop(Table::open(dir.path().join("one.db"), options).unwrap());
        drop(Table::open(dir.path().join("two.db"), options).unwrap());

        let registry = Registry::new(dir.path().to_path_buf(), options);
        load_workers(&registry, dir.path());
        assert_eq!(registry.loaded_tables(), vec!["one", "two"]);
    }
}
