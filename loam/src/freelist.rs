use std::io;

use crate::meta::FREELIST_PAGE_NUM;
use crate::page::{get_u16, get_u64, insert_page_marker, put_u16, put_u64, verify_page_marker};
use crate::{Page, PageNum, PAGE_MARKER_SIZE, PAGE_NUM_SIZE};

// Serialized byte widths of the freelist page header fields.
const MAX_PAGE_FIELD_SIZE: usize = PAGE_NUM_SIZE;
const RELEASED_COUNT_SIZE: usize = 2;

/// The freelist assigns the next available page, either by reusing the space
/// of a freed page or by extending the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freelist {
    /// The maximum page allocated so far. max_page * page_size = file size.
    pub max_page: PageNum,

    /// Pages that were previously allocated but are now free, popped LIFO.
    released_pages: Vec<PageNum>,
}

impl Default for Freelist {
    fn default() -> Self {
        Self::new()
    }
}

impl Freelist {
    pub fn new() -> Self {
        Self {
            max_page: crate::meta::ROOT_NODE_PAGE_NUM,
            released_pages: Vec::new(),
        }
    }

    /// Returns a page number for writing. Released pages are handed out
    /// first to avoid growing the file; otherwise the watermark advances.
    pub fn next_page(&mut self) -> PageNum {
        if let Some(page_num) = self.released_pages.pop() {
            return page_num;
        }

        self.max_page += 1;
        self.max_page
    }

    /// Marks a page as free for reuse. The meta and freelist pages are never
    /// released.
    pub fn release_page(&mut self, page_num: PageNum) {
        if page_num <= FREELIST_PAGE_NUM {
            return;
        }
        self.released_pages.push(page_num);
    }

    pub fn released_pages(&self) -> &[PageNum] {
        &self.released_pages
    }

    pub fn serialize_to_page(&self, page_size: usize) -> io::Result<Page> {
        let header = PAGE_MARKER_SIZE + MAX_PAGE_FIELD_SIZE + RELEASED_COUNT_SIZE;
        if header + self.released_pages.len() * PAGE_NUM_SIZE > page_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "released page stack does not fit the freelist page",
            ));
        }

        let mut page = Page::new_empty(FREELIST_PAGE_NUM, page_size);
        let mut pos = 0;

        insert_page_marker(&mut page.contents);
        pos += PAGE_MARKER_SIZE;

        put_u64(&mut page.contents, pos, self.max_page);
        pos += MAX_PAGE_FIELD_SIZE;

        put_u16(&mut page.contents, pos, self.released_pages.len() as u16);
        pos += RELEASED_COUNT_SIZE;

        for page_num in &self.released_pages {
            put_u64(&mut page.contents, pos, *page_num);
            pos += PAGE_NUM_SIZE;
        }

        Ok(page)
    }

    pub fn deserialize_from_page(page: &Page) -> io::Result<Freelist> {
        verify_page_marker(&page.contents)?;
        let mut pos = PAGE_MARKER_SIZE;

        let max_page = get_u64(&page.contents, pos);
        pos += MAX_PAGE_FIELD_SIZE;

        let released_count = get_u16(&page.contents, pos) as usize;
        pos += RELEASED_COUNT_SIZE;

        if pos + released_count * PAGE_NUM_SIZE > page.contents.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "released page count exceeds the freelist page",
            ));
        }

        let mut released_pages = Vec::with_capacity(released_count);
        for _ in 0..released_count {
            released_pages.push(get_u64(&page.contents, pos));
            pos += PAGE_NUM_SIZE;
        }

        Ok(Freelist {
            max_page,
            released_pages,
        })
    }
}
