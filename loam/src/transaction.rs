use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::failpoint;
use crate::filestamp;
use crate::freelist::Freelist;
use crate::meta::Meta;
use crate::node::Node;
use crate::pager::Pager;
use crate::wal::Wal;
use crate::{Options, PageNum};

/// A transaction is the sum of all pages to update from one user operation:
/// an optionally dirtied meta, an optionally dirtied freelist, and the
/// modified nodes. Staging is idempotent; restaging a page number overwrites
/// the earlier entry.
#[derive(Debug, Default)]
pub struct Transaction {
    pub(crate) meta: Option<Meta>,
    pub(crate) freelist: Option<Freelist>,
    pub(crate) dirty_pages: BTreeMap<PageNum, Node>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_meta(&mut self, meta: &Meta) {
        self.meta = Some(*meta);
    }

    pub fn stage_freelist(&mut self, freelist: &Freelist) {
        self.freelist = Some(freelist.clone());
    }

    pub fn stage_node(&mut self, node: &Node) {
        self.dirty_pages.insert(node.page_num, node.clone());
    }

    pub fn dirty_node(&self, page_num: PageNum) -> Option<&Node> {
        self.dirty_pages.get(&page_num)
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_none() && self.freelist.is_none() && self.dirty_pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.meta = None;
        self.freelist = None;
        self.dirty_pages.clear();
    }

    /// Commits the staged pages atomically: the WAL file is made durable
    /// (sealed with the success marker and fsynced) strictly before any
    /// write to the table file begins, then the log is replayed into the
    /// table file, synced, and removed.
    ///
    /// Committing an empty transaction is a no-op.
    pub fn commit(&mut self, pager: &Pager, table_path: &Path, options: &Options) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        failpoint::trip("txn.commit.before_wal")?;

        let mut wal = Wal::new(options.page_size);
        if let Some(meta) = &self.meta {
            wal.append_page(meta.serialize_to_page(options.page_size));
        }
        if let Some(freelist) = &self.freelist {
            wal.append_page(freelist.serialize_to_page(options.page_size)?);
        }
        for node in self.dirty_pages.values() {
            wal.append_page(node.serialize_to_page(options.page_size)?);
        }

        let wal_path = wal_path_for(table_path)?;
        crate::loam_debug_log!("[Transaction::commit] Writing WAL to {wal_path:?}");
        wal.write_log(&wal_path)?;

        failpoint::trip("txn.commit.after_wal")?;

        for page in wal.pages() {
            pager.write_page(page)?;
        }
        pager.sync()?;

        failpoint::trip("txn.commit.before_wal_remove")?;

        fs::remove_file(&wal_path)?;
        self.clear();
        Ok(())
    }
}

/// Derives a fresh WAL path next to the table file:
/// `<stem>_<stamp>-<seq>.wal`.
fn wal_path_for(table_path: &Path) -> io::Result<PathBuf> {
    let stem = table_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "table path has no stem"))?;

    Ok(table_path.with_file_name(filestamp::file_name_monotonic(stem, "wal")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Item;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 128;

    fn options() -> Options {
        Options::new(PAGE_SIZE, 0.5, 0.95)
    }

    fn staged_transaction() -> Transaction {
        let mut txn = Transaction::new();
        let node = Node {
            page_num: 2,
            items: vec![Item::new(b"k".to_vec(), b"v".to_vec())],
            child_nodes: vec![],
        };
        txn.stage_meta(&Meta::new());
        txn.stage_node(&node);
        txn
    }

    fn wal_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "wal"))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn empty_commit_is_a_no_op() {
        let dir = tempdir().unwrap();
        let table_path = dir.path().join("t.db");
        let pager = Pager::open(&table_path, PAGE_SIZE).unwrap();

        let mut txn = Transaction::new();
        txn.commit(&pager, &table_path, &options()).unwrap();
        assert!(wal_files(dir.path()).is_empty());
    }

    #[test]
    fn commit_applies_pages_and_removes_wal() {
        let dir = tempdir().unwrap();
        let table_path = dir.path().join("t.db");
        let pager = Pager::open(&table_path, PAGE_SIZE).unwrap();

        let mut txn = staged_transaction();
        txn.commit(&pager, &table_path, &options()).unwrap();

        assert!(txn.is_empty());
        assert!(wal_files(dir.path()).is_empty());

        let node = Node::deserialize_from_page(&pager.read_page(2).unwrap());
        assert_eq!(node.items[0].key, b"k");
        assert_eq!(node.items[0].value, b"v");
    }

    #[test]
    fn failure_before_wal_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let table_path = dir.path().join("t.db");
        let pager = Pager::open(&table_path, PAGE_SIZE).unwrap();

        let mut txn = staged_transaction();
        let armed = failpoint::arm("txn.commit.before_wal");
        let result = txn.commit(&pager, &table_path, &options());
        drop(armed);

        assert!(result.is_err());
        assert!(wal_files(dir.path()).is_empty());
        let page = pager.read_page(2).unwrap();
        assert!(page.contents.iter().all(|b| *b == 0));
    }

    #[test]
    fn failure_after_wal_is_recoverable() {
        let dir = tempdir().unwrap();
        let table_path = dir.path().join("t.db");
        let pager = Pager::open(&table_path, PAGE_SIZE).unwrap();

        let mut txn = staged_transaction();
        let armed = failpoint::arm("txn.commit.after_wal");
        let result = txn.commit(&pager, &table_path, &options());
        drop(armed);

        assert!(result.is_err());
        // The table file was not touched, but the durable WAL carries the
        // transaction.
        let page = pager.read_page(2).unwrap();
        assert!(page.contents.iter().all(|b| *b == 0));

        let wals = wal_files(dir.path());
        assert_eq!(wals.len(), 1);
        crate::wal::recover_from_log(&wals[0], &pager).unwrap();

        let node = Node::deserialize_from_page(&pager.read_page(2).unwrap());
        assert_eq!(node.items[0].value, b"v");
        assert!(wal_files(dir.path()).is_empty());
    }

    #[test]
    fn replayed_but_unremoved_wal_is_idempotent() {
        let dir = tempdir().unwrap();
        let table_path = dir.path().join("t.db");
        let pager = Pager::open(&table_path, PAGE_SIZE).unwrap();

        let mut txn = staged_transaction();
        let armed = failpoint::arm("txn.commit.before_wal_remove");
        let result = txn.commit(&pager, &table_path, &options());
        drop(armed);

        assert!(result.is_err());
        let wals = wal_files(dir.path());
        assert_eq!(wals.len(), 1);

        // The table file already holds the pages; replaying again must yield
        // the same state.
        crate::wal::recover_from_log(&wals[0], &pager).unwrap();
        let node = Node::deserialize_from_page(&pager.read_page(2).unwrap());
        assert_eq!(node.items[0].value, b"v");
        assert!(wal_files(dir.path()).is_empty());
    }

    #[test]
    fn wal_path_carries_table_stem() {
        let path = wal_path_for(Path::new("/data/plants.db")).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("plants_"));
        assert!(name.ends_with(".wal"));
    }
}
