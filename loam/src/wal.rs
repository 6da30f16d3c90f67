//! A write-ahead log details the page writes a transaction will commit to
//! the table file before they happen.
//!
//! When a WAL file is written out it is stamped with a success marker at the
//! end. If the marker is missing, power loss occurred during WAL creation
//! and the intent of the operation cannot be determined; the log is
//! discarded and the represented transaction does not happen.
//!
//! Actions are only replayed if the WAL file is valid: it can be opened and
//! read, contains the success marker, and holds an expected number of bytes.
//! Invalid files are deleted. A WAL whose replay fails mid-way is retained
//! so a later startup can replay it again; individual page writes address
//! specific page numbers with specific contents, so replay is idempotent.
//!
//! WAL files are deleted after transactions complete, as they are only used
//! for recovery.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::failpoint;
use crate::page::{get_u64, insert_page_marker, put_u64, verify_page_marker};
use crate::pager::Pager;
use crate::{Page, PAGE_MARKER_SIZE, PAGE_NUM_SIZE, WAL_SUCCESS_MARKER};

/// The staged pages of one transaction, in append order.
pub struct Wal {
    page_size: usize,
    pages: Vec<Page>,
}

impl Wal {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
        }
    }

    /// How many dirty pages one WAL file can describe: its meta page packs
    /// 8-byte page numbers after the 4-byte marker.
    pub fn max_pages(page_size: usize) -> usize {
        (page_size - PAGE_MARKER_SIZE) / PAGE_NUM_SIZE
    }

    pub fn append_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Serializes the staged pages and writes them to `path` in one shot:
    /// the WAL meta page (marker + packed page numbers), each page's
    /// contents verbatim, then the success marker. Refuses to overwrite an
    /// existing file, which would indicate a prior unfinished transaction
    /// that recovery has not handled yet.
    pub fn write_log(&self, path: &Path) -> io::Result<()> {
        if self.pages.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAL has no pages to write",
            ));
        }
        if self.pages.len() > Self::max_pages(self.page_size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "transaction exceeds WAL page capacity",
            ));
        }

        let mut out = Vec::with_capacity((self.pages.len() + 1) * self.page_size + 4);

        let mut meta_page = vec![0u8; self.page_size];
        insert_page_marker(&mut meta_page);
        let mut pos = PAGE_MARKER_SIZE;
        for page in &self.pages {
            put_u64(&mut meta_page, pos, page.page_num);
            pos += PAGE_NUM_SIZE;
        }
        out.extend_from_slice(&meta_page);

        for page in &self.pages {
            out.extend_from_slice(&page.contents);
        }
        out.extend_from_slice(&WAL_SUCCESS_MARKER);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o644)
            .open(path)?;
        file.write_all(&out)?;
        file.sync_all()
    }
}

/// Inspects a write-ahead log file and, if it is valid, replays the logged
/// page writes through the pager.
///
/// Structurally invalid files (misaligned size, missing success marker, bad
/// meta-page marker) are deleted without replay. A replay that fails midway
/// keeps the WAL on disk and returns the error, so a later attempt can
/// re-apply it; the table file must not be trusted until that happens.
pub fn recover_from_log(path: &Path, pager: &Pager) -> io::Result<()> {
    crate::loam_debug_log!("[wal::recover_from_log] Inspecting {path:?}");
    let page_size = pager.page_size();

    let size = fs::metadata(path)?.len() as usize;
    let marker_size = WAL_SUCCESS_MARKER.len();
    if size < marker_size + page_size || (size - marker_size) % page_size != 0 {
        return discard(path);
    }

    let contents = fs::read(path)?;
    let (body, marker) = contents.split_at(contents.len() - marker_size);
    if marker != WAL_SUCCESS_MARKER.as_slice() {
        return discard(path);
    }

    let (meta_page, mut cells) = body.split_at(page_size);
    if verify_page_marker(meta_page).is_err() {
        return discard(path);
    }

    let num_pages = cells.len() / page_size;
    if num_pages > Wal::max_pages(page_size) {
        return discard(path);
    }

    let mut pos = PAGE_MARKER_SIZE;
    for _ in 0..num_pages {
        let page_num = get_u64(meta_page, pos);
        pos += PAGE_NUM_SIZE;

        let (chunk, rest) = cells.split_at(page_size);
        cells = rest;

        let page = Page {
            page_num,
            contents: chunk.to_vec(),
        };
        failpoint::trip("wal.recover.replay_page")?;
        pager.write_page(&page)?;
    }

    pager.sync()?;
    fs::remove_file(path)
}

fn discard(path: &Path) -> io::Result<()> {
    crate::loam_debug_log!("[wal::discard] Removing invalid WAL file {path:?}");
    fs::remove_file(path)
}
