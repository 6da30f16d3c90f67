use std::cmp::Ordering;
use std::io;

use crate::page::{get_u16, get_u64, put_u16, put_u64};
use crate::{Options, Page, PageNum, NODE_HEADER_SIZE, PAGE_NUM_SIZE};

/// The maximum length of a key or a value, bounded by the single-byte length
/// prefixes in the cell layout.
pub const MAX_KEY_SIZE: usize = 255;
pub const MAX_VALUE_SIZE: usize = 255;

/// One user key-value pair. Items always live inside a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Item {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }
}

/// A B-tree node stored in one page. Nodes hold items and, when internal,
/// pointers to the child nodes that bracket them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub page_num: PageNum,
    pub items: Vec<Item>,
    pub child_nodes: Vec<PageNum>,
}

impl Node {
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Is this a node with no children?
    pub fn is_leaf(&self) -> bool {
        self.child_nodes.is_empty()
    }

    // -------Serialization-----------------------------------------------------

    // We use slotted pages for storing data. The actual keys and values (the
    // cells) pack leftward from the page tail whereas the fixed-size offsets
    // and child pointers grow rightward from the header:
    //
    // -------------------------------------------------------------------------
    // |  Page  | key-value /  child node    key-value       |  key-value      |
    // | Header |   offset  /   pointer       offset   ....  |    data   ..... |
    // -------------------------------------------------------------------------

    pub fn serialize_to_page(&self, page_size: usize) -> io::Result<Page> {
        let mut page = Page::new_empty(self.page_num, page_size);
        let buf = &mut page.contents;
        let is_leaf = self.is_leaf();

        let mut left_pos = 0;
        let mut right_pos = buf.len() - 1;

        buf[left_pos] = is_leaf as u8;
        left_pos += 1;

        put_u16(buf, left_pos, self.items.len() as u16);
        left_pos += 2;

        for (i, item) in self.items.iter().enumerate() {
            if !is_leaf {
                put_u64(buf, left_pos, self.child_nodes[i]);
                left_pos += PAGE_NUM_SIZE;
            }

            let klen = item.key.len();
            let vlen = item.value.len();

            let cell_start = right_pos
                .checked_sub(klen + vlen + 2)
                .filter(|start| left_pos + 2 <= *start)
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "node does not fit in one page")
                })?;

            put_u16(buf, left_pos, cell_start as u16);
            left_pos += 2;

            right_pos -= vlen;
            buf[right_pos..right_pos + vlen].copy_from_slice(&item.value);
            right_pos -= 1;
            buf[right_pos] = vlen as u8;

            right_pos -= klen;
            buf[right_pos..right_pos + klen].copy_from_slice(&item.key);
            right_pos -= 1;
            buf[right_pos] = klen as u8;
        }

        if !is_leaf {
            if left_pos + PAGE_NUM_SIZE > right_pos {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "node does not fit in one page",
                ));
            }
            let last_child = self.child_nodes[self.child_nodes.len() - 1];
            put_u64(buf, left_pos, last_child);
        }

        Ok(page)
    }

    /// Rebuilds a node from page contents. A zeroed page would read as a
    /// non-leaf and invent a child pointer to page 0; pages of all zeroes are
    /// treated as a leaf with zero items instead.
    pub fn deserialize_from_page(page: &Page) -> Node {
        let mut node = Node {
            page_num: page.page_num,
            ..Default::default()
        };

        if page.contents.iter().all(|byte| *byte == 0) {
            return node;
        }

        let buf = &page.contents;
        let is_leaf = buf[0] != 0;
        let item_count = get_u16(buf, 1) as usize;
        let mut left_pos = NODE_HEADER_SIZE;

        for _ in 0..item_count {
            if !is_leaf {
                node.child_nodes.push(get_u64(buf, left_pos));
                left_pos += PAGE_NUM_SIZE;
            }

            let mut offset = get_u16(buf, left_pos) as usize;
            left_pos += 2;

            let klen = buf[offset] as usize;
            offset += 1;
            let key = buf[offset..offset + klen].to_vec();
            offset += klen;

            let vlen = buf[offset] as usize;
            offset += 1;
            let value = buf[offset..offset + vlen].to_vec();

            node.items.push(Item::new(key, value));
        }

        if !is_leaf {
            node.child_nodes.push(get_u64(buf, left_pos));
        }

        node
    }

    // -------Size Accounting---------------------------------------------------

    /// The size of the element at index `i`: key and value bytes, plus a
    /// child pointer for internal nodes.
    pub fn element_size(&self, i: usize) -> usize {
        let item = &self.items[i];
        let mut size = item.key.len() + item.value.len();
        if !self.is_leaf() {
            size += PAGE_NUM_SIZE;
        }
        size
    }

    /// The node's size in bytes under the accounting used by the thresholds.
    pub fn node_size(&self) -> usize {
        let mut size = NODE_HEADER_SIZE;
        for i in 0..self.items.len() {
            size += self.element_size(i);
        }
        size + PAGE_NUM_SIZE
    }

    /// Does the node require splitting?
    pub fn is_over_populated(&self, options: &Options) -> bool {
        self.node_size() as f32 > options.max_threshold()
    }

    /// Does the node require consolidating?
    pub fn is_under_populated(&self, options: &Options) -> bool {
        (self.node_size() as f32) < options.min_threshold()
    }

    // -------Item Access-------------------------------------------------------

    /// Scans the node's items for the key. On a match returns its index;
    /// otherwise returns the index where the key should have been (the first
    /// index whose key is greater than the target).
    pub fn find_key_in_node(&self, key: &[u8]) -> (bool, usize) {
        for (i, existing) in self.items.iter().enumerate() {
            match existing.key.as_slice().cmp(key) {
                Ordering::Equal => return (true, i),
                Ordering::Greater => return (false, i),
                Ordering::Less => {}
            }
        }

        (false, self.items.len())
    }

    /// Inserts the item at the given index, shifting later items right.
    pub fn add_item(&mut self, item: Item, insertion_index: usize) {
        let index = insertion_index.min(self.items.len());
        self.items.insert(index, item);
    }
}

// -------Rotations-----------------------------------------------------------

/// Moves the last item of `a` up into the parent and the old parent
/// separator down to the front of `b`. For internal nodes the last child of
/// `a` moves to the front of `b`. `b_index` is `b`'s child index in the
/// parent.
pub(crate) fn rotate_right(a: &mut Node, parent: &mut Node, b: &mut Node, b_index: usize) {
    let a_item = a.items.pop().expect("rotation donor holds an item");
    let parent_item = std::mem::replace(&mut parent.items[b_index - 1], a_item);
    b.items.insert(0, parent_item);

    if !a.is_leaf() {
        let child = a.child_nodes.pop().expect("internal node holds a child");
        b.child_nodes.insert(0, child);
    }
}

/// Symmetric to [`rotate_right`]: first item of `b` up into the parent, old
/// separator appended to `a`.
pub(crate) fn rotate_left(a: &mut Node, parent: &mut Node, b: &mut Node, b_index: usize) {
    let b_item = b.items.remove(0);
    let parent_item = std::mem::replace(&mut parent.items[b_index - 1], b_item);
    a.items.push(parent_item);

    if !b.is_leaf() {
        let child = b.child_nodes.remove(0);
        a.child_nodes.push(child);
    }
}
