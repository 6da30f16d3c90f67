use std::io;

use crate::page::{get_u64, insert_page_marker, put_u64, verify_page_marker};
use crate::{Page, PageNum, PAGE_MARKER_SIZE, PAGE_NUM_SIZE};

pub const META_PAGE_NUM: PageNum = 0;
pub const FREELIST_PAGE_NUM: PageNum = 1;
pub const ROOT_NODE_PAGE_NUM: PageNum = 2;

/// The table file's table of contents, always at page 0. Records the page
/// numbers of the freelist and root node pages. Rewritten only when the root
/// page number changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    pub freelist_page_num: PageNum,
    pub root_page_num: PageNum,
}

impl Default for Meta {
    fn default() -> Self {
        Self::new()
    }
}

impl Meta {
    pub fn new() -> Self {
        Self {
            freelist_page_num: FREELIST_PAGE_NUM,
            root_page_num: ROOT_NODE_PAGE_NUM,
        }
    }

    pub fn serialize_to_page(&self, page_size: usize) -> Page {
        let mut page = Page::new_empty(META_PAGE_NUM, page_size);
        let mut pos = 0;

        insert_page_marker(&mut page.contents);
        pos += PAGE_MARKER_SIZE;

        put_u64(&mut page.contents, pos, self.freelist_page_num);
        pos += PAGE_NUM_SIZE;

        put_u64(&mut page.contents, pos, self.root_page_num);

        page
    }

    pub fn deserialize_from_page(page: &Page) -> io::Result<Meta> {
        verify_page_marker(&page.contents)?;
        let mut pos = PAGE_MARKER_SIZE;

        let freelist_page_num = get_u64(&page.contents, pos);
        pos += PAGE_NUM_SIZE;

        let root_page_num = get_u64(&page.contents, pos);

        Ok(Meta {
            freelist_page_num,
            root_page_num,
        })
    }
}
