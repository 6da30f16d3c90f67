use std::fs::{create_dir_all, File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

use crate::{Page, PageNum};

/// Owns the open file handle for one table and reads/writes/syncs fixed-size
/// pages by page number. The pager is not itself concurrent; the table
/// serializes access through its rwlock.
pub struct Pager {
    file: File,
    page_size: usize,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> io::Result<Self> {
        let path_ref = path.as_ref();
        crate::loam_debug_log!("[Pager::open] Opening table file at: {path_ref:?}");
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path_ref)?;

        Ok(Self { file, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reads the page at `page_num`. A read past the end of the file, or a
    /// short read at the file tail, yields zero bytes for the unread
    /// remainder; higher layers rely on marker verification instead.
    pub fn read_page(&self, page_num: PageNum) -> io::Result<Page> {
        crate::loam_debug_log!("[Pager::read_page] Reading page_num: {page_num}");
        let mut page = Page::new_empty(page_num, self.page_size);
        let offset = page_num * self.page_size as u64;

        let mut filled = 0;
        while filled < self.page_size {
            let n = self
                .file
                .read_at(&mut page.contents[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(page)
    }

    /// Writes the page at its own page number. Fails if the buffer is not
    /// exactly one page long.
    pub fn write_page(&self, page: &Page) -> io::Result<()> {
        crate::loam_debug_log!("[Pager::write_page] Writing page_num: {}", page.page_num);
        if page.contents.len() != self.page_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "page size mismatch",
            ));
        }

        let offset = page.page_num * self.page_size as u64;
        self.file.write_all_at(&page.contents, offset)
    }

    /// Flushes OS buffers to stable storage.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_pager_round_trip() {
        let temp_dir = tempdir().unwrap();
        let temp_path = temp_dir.path().join("test.db");

        let pager = Pager::open(&temp_path, 128).unwrap();
        let mut page = Page::new_empty(3, 128);
        page.contents[0] = 42;
        page.contents[127] = 7;
        pager.write_page(&page).unwrap();
        pager.sync().unwrap();
        drop(pager);

        let pager = Pager::open(&temp_path, 128).unwrap();
        let read = pager.read_page(3).unwrap();
        assert_eq!(read.contents, page.contents);
    }

    #[test]
    fn test_short_read_is_zero_filled() {
        let temp_dir = tempdir().unwrap();
        let temp_path = temp_dir.path().join("short.db");

        let mut file = std::fs::File::create(&temp_path).unwrap();
        file.write_all(&[9u8; 70]).unwrap();
        drop(file);

        let pager = Pager::open(&temp_path, 64).unwrap();
        let page = pager.read_page(1).unwrap();
        assert_eq!(&page.contents[..6], &[9u8; 6]);
        assert_eq!(&page.contents[6..], &[0u8; 58]);

        // Entirely past the end of the file: a valid zero page.
        let page = pager.read_page(10).unwrap();
        assert!(page.contents.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_wrong_size_write_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let pager = Pager::open(temp_dir.path().join("size.db"), 64).unwrap();

        let page = Page {
            page_num: 0,
            contents: vec![0; 63],
        };
        let err = pager.write_page(&page).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
