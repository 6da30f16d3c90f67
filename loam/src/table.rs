use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::freelist::Freelist;
use crate::meta::{Meta, META_PAGE_NUM, ROOT_NODE_PAGE_NUM};
use crate::node::{self, Item, Node, MAX_KEY_SIZE, MAX_VALUE_SIZE};
use crate::pager::Pager;
use crate::transaction::Transaction;
use crate::{Options, PageNum, NODE_HEADER_SIZE};

/// A table binds a pager, meta, freelist, and root into one key-value
/// namespace backed by one file. A table can have an arbitrary number of
/// readers or exactly one writer at a time, but never both; `get` takes the
/// read lock, `put` and `del` hold the write lock across the whole
/// operation including its commit.
pub struct Table {
    name: String,
    path: PathBuf,
    options: Options,
    inner: RwLock<TableInner>,
}

struct TableInner {
    pager: Pager,
    meta: Meta,
    freelist: Freelist,
    txn: Transaction,
}

impl Table {
    /// Gets the table at `path`, creating it if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> io::Result<Table> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            Self::open_existing(path, options)
        } else {
            Self::create(path, options)
        }
    }

    /// Creates a new table file with page 0 = meta, page 1 = freelist and
    /// page 2 = the initial empty root node.
    fn create(path: PathBuf, options: Options) -> io::Result<Table> {
        crate::loam_debug_log!("[Table::create] Creating table file at: {path:?}");
        let pager = Pager::open(&path, options.page_size)?;

        let meta = Meta::new();
        let freelist = Freelist::new();

        pager.write_page(&meta.serialize_to_page(options.page_size))?;
        pager.write_page(&freelist.serialize_to_page(options.page_size)?)?;
        pager.sync()?;

        let mut inner = TableInner {
            pager,
            meta,
            freelist,
            txn: Transaction::new(),
        };

        let mut root = Node::new_empty();
        root.page_num = ROOT_NODE_PAGE_NUM;
        inner.write_node(&mut root);
        inner.txn.stage_meta(&inner.meta);
        inner.txn.stage_freelist(&inner.freelist);
        inner.commit_txn(&path, &options)?;

        Ok(Table {
            name: table_name(&path),
            path,
            options,
            inner: RwLock::new(inner),
        })
    }

    /// Opens an existing table file, reading page 0 (meta) and then the
    /// freelist page it points at. The root is loaded lazily.
    fn open_existing(path: PathBuf, options: Options) -> io::Result<Table> {
        crate::loam_debug_log!("[Table::open_existing] Opening table file at: {path:?}");
        let pager = Pager::open(&path, options.page_size)?;

        let meta_page = pager.read_page(META_PAGE_NUM)?;
        let meta = Meta::deserialize_from_page(&meta_page)
            .map_err(|e| io::Error::new(e.kind(), format!("read meta: {e}")))?;

        let freelist_page = pager.read_page(meta.freelist_page_num)?;
        let freelist = Freelist::deserialize_from_page(&freelist_page)
            .map_err(|e| io::Error::new(e.kind(), format!("read freelist: {e}")))?;

        Ok(Table {
            name: table_name(&path),
            path,
            options,
            inner: RwLock::new(TableInner {
                pager,
                meta,
                freelist,
                txn: Transaction::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Flushes the table file to stable storage. The file handle itself
    /// closes when the table is dropped.
    pub fn close(&self) -> io::Result<()> {
        let inner = self.inner.read().unwrap();
        inner.pager.sync()
    }

    // -------Value Operators---------------------------------------------------

    /// Returns the item stored under `key`, if any.
    pub fn get(&self, key: &[u8]) -> io::Result<Option<Item>> {
        let inner = self.inner.read().unwrap();
        let (index, containing_node, _) = inner.find_key(key, true)?;
        Ok(index.map(|i| containing_node.items[i].clone()))
    }

    /// Adds a key to the tree, replacing in place when the key already
    /// exists. Modified nodes are split on the way back up when they exceed
    /// the maximum threshold, growing a new root if needed, and the whole
    /// operation commits atomically before returning.
    pub fn put(&self, key: &[u8], value: &[u8]) -> io::Result<()> {
        if key.len() > MAX_KEY_SIZE || value.len() > MAX_VALUE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "key or value exceeds 255 bytes",
            ));
        }

        let mut inner = self.inner.write().unwrap();
        let result = inner.put_and_commit(key, value, &self.path, &self.options);
        if result.is_err() {
            inner.txn.clear();
        }
        result
    }

    /// Removes a key from the tree. Underpopulated nodes are rebalanced on
    /// the way back up by rotating from a sibling that can spare an element,
    /// or merging otherwise; an emptied root hands the tree down one level.
    /// Deleting a missing key commits nothing.
    pub fn del(&self, key: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.write().unwrap();
        let result = inner.del_and_commit(key, &self.path, &self.options);
        if result.is_err() {
            inner.txn.clear();
        }
        result
    }

    // -------Introspection-----------------------------------------------------

    pub fn root_page_num(&self) -> PageNum {
        self.inner.read().unwrap().meta.root_page_num
    }

    /// Reads the node at `page_num`, preferring the staged copy when one
    /// exists. Intended for inspection and tests.
    pub fn read_node(&self, page_num: PageNum) -> io::Result<Node> {
        self.inner.read().unwrap().get_node(page_num)
    }
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

impl TableInner {
    // -------Node IO-----------------------------------------------------------

    /// Fetches the node at `page_num`. A node staged in the current
    /// transaction shadows whatever is on disk.
    fn get_node(&self, page_num: PageNum) -> io::Result<Node> {
        if let Some(node) = self.txn.dirty_node(page_num) {
            return Ok(node.clone());
        }

        let page = self.pager.read_page(page_num)?;
        Ok(Node::deserialize_from_page(&page))
    }

    /// Builds a node on a freshly allocated page.
    fn new_node(&mut self, items: Vec<Item>, child_nodes: Vec<PageNum>) -> Node {
        let page_num = self.freelist.next_page();
        self.txn.stage_freelist(&self.freelist);
        Node {
            page_num,
            items,
            child_nodes,
        }
    }

    /// Stages the node into the current transaction, allocating a page for
    /// it first when it has none.
    fn write_node(&mut self, node: &mut Node) {
        if node.page_num == 0 {
            node.page_num = self.freelist.next_page();
            self.txn.stage_freelist(&self.freelist);
        }
        self.txn.stage_node(node);
    }

    /// Releases the node's page back to the freelist.
    fn delete_node(&mut self, page_num: PageNum) {
        self.freelist.release_page(page_num);
        self.txn.stage_freelist(&self.freelist);
    }

    fn commit_txn(&mut self, table_path: &Path, options: &Options) -> io::Result<()> {
        let TableInner { pager, txn, .. } = self;
        txn.commit(pager, table_path, options)
    }

    // -------Tree Traversal----------------------------------------------------

    /// Descends from the root looking for `key`. Within a node a linear
    /// scan compares keys, returning on a match or descending on the first
    /// key greater than the target. With `exact`, a miss at a leaf yields
    /// `None`; otherwise the insertion position is returned. The ancestor
    /// indexes are the child slots taken at each level, with a leading 0 for
    /// the root, so callers can reload the path for rebalancing.
    fn find_key(&self, key: &[u8], exact: bool) -> io::Result<(Option<usize>, Node, Vec<usize>)> {
        let mut ancestor_indexes = vec![0];
        let mut node = self.get_node(self.meta.root_page_num)?;

        loop {
            let (was_found, index) = node.find_key_in_node(key);
            if was_found {
                return Ok((Some(index), node, ancestor_indexes));
            }

            if node.is_leaf() {
                if exact {
                    return Ok((None, node, ancestor_indexes));
                }
                return Ok((Some(index), node, ancestor_indexes));
            }

            ancestor_indexes.push(index);
            node = self.get_node(node.child_nodes[index])?;
        }
    }

    /// Reloads the nodes along a breadcrumb trail of child indexes from the
    /// root.
    ///
    /// ```text
    ///          p
    ///      /       \
    ///    a           b
    /// /     \     /    \
    /// c      d   e      f
    /// ```
    ///
    /// For [0,1,0] -> p,b,e
    fn get_nodes(&self, indexes: &[usize]) -> io::Result<Vec<Node>> {
        let root = self.get_node(self.meta.root_page_num)?;

        let mut nodes = vec![root];
        for i in 1..indexes.len() {
            let child_page = nodes[i - 1].child_nodes[indexes[i]];
            nodes.push(self.get_node(child_page)?);
        }
        Ok(nodes)
    }

    // -------Tree Balancing----------------------------------------------------

    /// Returns the index where a split should happen, or `None` when the
    /// node cannot spare an element: the first index past the point where
    /// the accumulated size clears the minimum threshold, as long as it is
    /// not the last item.
    fn get_split_index(&self, node: &Node, options: &Options) -> Option<usize> {
        let mut size = NODE_HEADER_SIZE;
        for i in 0..node.items.len() {
            size += node.element_size(i);

            if size as f32 > options.min_threshold() && i < node.items.len() - 1 {
                return Some(i + 1);
            }
        }

        None
    }

    fn can_spare_an_element(&self, node: &Node, options: &Options) -> bool {
        self.get_split_index(node, options).is_some()
    }

    /// Splits an over-populated child of `parent`. The middle item moves up
    /// into the parent and a new sibling takes the items (and children) past
    /// it:
    ///
    /// ```text
    ///            parent                       parent
    ///               3                          3,6
    ///         /        \          ->      /    |    \
    ///       a          child             a   child   new
    ///      1,2       4,5,6,7,8          1,2   4,5    7,8
    /// ```
    fn split_child(
        &mut self,
        parent: &mut Node,
        child: &mut Node,
        child_index: usize,
        options: &Options,
    ) -> io::Result<()> {
        let split_index = self.get_split_index(child, options).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "split target cannot spare an element",
            )
        })?;

        let middle = child.items[split_index].clone();

        let mut new_node = if child.is_leaf() {
            let tail_items = child.items.split_off(split_index + 1);
            self.new_node(tail_items, Vec::new())
        } else {
            let tail_items = child.items.split_off(split_index + 1);
            let tail_children = child.child_nodes.split_off(split_index + 1);
            self.new_node(tail_items, tail_children)
        };
        child.items.truncate(split_index);
        self.write_node(&mut new_node);

        parent.add_item(middle, child_index);
        parent.child_nodes.insert(child_index + 1, new_node.page_num);

        self.write_node(parent);
        self.write_node(child);
        Ok(())
    }

    /// Removes the item at `index` of an internal node by overwriting it
    /// with its in-order predecessor: descend into the left child and follow
    /// the rightmost spine to a leaf, take that leaf's last item, and return
    /// the descent path so the leaf joins the rebalance walk.
    fn remove_from_internal(&mut self, node: &mut Node, index: usize) -> io::Result<Vec<usize>> {
        let mut affected = vec![index];

        let mut current = self.get_node(node.child_nodes[index])?;
        while !current.is_leaf() {
            let traversing_index = current.child_nodes.len() - 1;
            let child_page = current.child_nodes[traversing_index];
            current = self.get_node(child_page)?;
            affected.push(traversing_index);
        }

        node.items[index] = current
            .items
            .pop()
            .expect("predecessor leaf holds at least one item");
        self.write_node(node);
        self.write_node(&mut current);

        Ok(affected)
    }

    /// Restores an under-populated child of `parent`: rotate from the left
    /// sibling if it can spare an element, then from the right, and merge as
    /// a last resort. The leftmost child absorbs its right sibling; any
    /// other child is merged into its left sibling.
    fn rebalance_remove(
        &mut self,
        parent: &mut Node,
        node: &mut Node,
        node_index: usize,
        options: &Options,
    ) -> io::Result<()> {
        if node_index > 0 {
            let mut left = self.get_node(parent.child_nodes[node_index - 1])?;
            if self.can_spare_an_element(&left, options) {
                node::rotate_right(&mut left, parent, node, node_index);
                self.write_node(&mut left);
                self.write_node(parent);
                self.write_node(node);
                return Ok(());
            }
        }

        if node_index < parent.child_nodes.len() - 1 {
            let mut right = self.get_node(parent.child_nodes[node_index + 1])?;
            if self.can_spare_an_element(&right, options) {
                node::rotate_left(node, parent, &mut right, node_index + 1);
                self.write_node(node);
                self.write_node(parent);
                self.write_node(&mut right);
                return Ok(());
            }
        }

        if node_index == 0 {
            self.merge(parent, node_index + 1)
        } else {
            self.merge(parent, node_index)
        }
    }

    /// Merges the child at `b_index` into its left sibling, pulling the
    /// separator between them down out of `parent`. The right node's page is
    /// released.
    fn merge(&mut self, parent: &mut Node, b_index: usize) -> io::Result<()> {
        let b_node = self.get_node(parent.child_nodes[b_index])?;
        let mut a_node = self.get_node(parent.child_nodes[b_index - 1])?;

        let separator = parent.items.remove(b_index - 1);
        a_node.items.push(separator);
        a_node.items.extend(b_node.items);
        parent.child_nodes.remove(b_index);

        if !a_node.is_leaf() {
            a_node.child_nodes.extend(b_node.child_nodes);
        }

        self.write_node(&mut a_node);
        self.write_node(parent);
        self.delete_node(b_node.page_num);
        Ok(())
    }

    // -------Value Operators---------------------------------------------------

    fn put_and_commit(
        &mut self,
        key: &[u8],
        value: &[u8],
        table_path: &Path,
        options: &Options,
    ) -> io::Result<()> {
        let item = Item::new(key.to_vec(), value.to_vec());

        // Find the path to the node where the insertion should happen.
        let (insertion_index, mut target, ancestor_indexes) = self.find_key(key, false)?;
        let insertion_index =
            insertion_index.expect("a non-exact search always yields an insertion index");

        let exists = insertion_index < target.items.len()
            && target.items[insertion_index].key == item.key;
        if exists {
            target.items[insertion_index] = item;
        } else {
            target.add_item(item, insertion_index);
        }

        // Persist the modified node even if no split occurs.
        self.write_node(&mut target);

        let mut ancestors = self.get_nodes(&ancestor_indexes)?;

        // Rebalance all the way up, starting one node before the last and
        // excluding the root.
        for i in (0..ancestors.len().saturating_sub(1)).rev() {
            let (upper, lower) = ancestors.split_at_mut(i + 1);
            let parent = &mut upper[i];
            let node = &mut lower[0];
            if node.is_over_populated(options) {
                self.split_child(parent, node, ancestor_indexes[i + 1], options)?;
            }
        }

        // An over-populated root grows the tree a level: a new root adopts
        // it as its only child and splits it.
        let root = &mut ancestors[0];
        if root.is_over_populated(options) {
            let mut new_root = self.new_node(Vec::new(), vec![root.page_num]);
            self.split_child(&mut new_root, root, 0, options)?;
            self.write_node(&mut new_root);

            self.meta.root_page_num = new_root.page_num;
            self.txn.stage_meta(&self.meta);
        }

        self.commit_txn(table_path, options)
    }

    fn del_and_commit(
        &mut self,
        key: &[u8],
        table_path: &Path,
        options: &Options,
    ) -> io::Result<()> {
        let (remove_index, mut target, mut ancestor_indexes) = self.find_key(key, true)?;
        let Some(remove_index) = remove_index else {
            // Deleting a missing key is a silent no-op.
            return Ok(());
        };

        if target.is_leaf() {
            target.items.remove(remove_index);
            self.write_node(&mut target);
        } else {
            let affected = self.remove_from_internal(&mut target, remove_index)?;
            ancestor_indexes.extend(affected);
        }

        let mut ancestors = self.get_nodes(&ancestor_indexes)?;

        // Rebalance all the way up, starting one node before the last and
        // excluding the root.
        for i in (0..ancestors.len().saturating_sub(1)).rev() {
            let (upper, lower) = ancestors.split_at_mut(i + 1);
            let parent = &mut upper[i];
            let node = &mut lower[0];
            if node.is_under_populated(options) {
                self.rebalance_remove(parent, node, ancestor_indexes[i + 1], options)?;
            }
        }

        // A root left with no items but a child hands the tree down a
        // level: its surviving child becomes the root.
        let root = &ancestors[0];
        if root.items.is_empty() && !root.child_nodes.is_empty() {
            let old_root_page = root.page_num;
            self.meta.root_page_num = root.child_nodes[0];
            self.txn.stage_meta(&self.meta);
            self.delete_node(old_root_page);
        }

        self.commit_txn(table_path, options)
    }
}
