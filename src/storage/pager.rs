//! Disk-backed page cache (spec.md §4.1).
//!
//! Grounded in `urunsiyabend-aerodb`'s `storage/pager.rs` for real
//! positional file I/O (the teacher's own pager keeps the whole table in
//! memory and flushes on close) and in the teacher's own
//! `heapless::Vec<_, TABLE_MAX_PAGES>` page table (`storage/table.rs`) for
//! the fixed-capacity slot array, generalized into a bounded, LRU-evicting
//! cache rather than an unbounded in-memory table.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};

pub use super::node::PAGE_SIZE;

pub type PageId = u32;

/// Number of resident page slots. Page 0 (the header) always occupies
/// slot 0 and is never evicted; the remaining slots are LRU-managed.
pub const CACHE_CAPACITY: usize = 100;

struct Slot {
    page_id: Option<PageId>,
    data: [u8; PAGE_SIZE],
    dirty: bool,
    last_used: u64,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            page_id: None,
            data: [0u8; PAGE_SIZE],
            dirty: false,
            last_used: 0,
        }
    }
}

pub struct Pager {
    file: File,
    num_pages: u32,
    slots: heapless::Vec<Slot, CACHE_CAPACITY>,
    index: std::collections::HashMap<PageId, usize>,
    tick: u64,
    /// `Some` while a transaction is open: original bytes of every page
    /// shadowed on its first in-transaction write (spec.md §4.6).
    shadow: Option<std::collections::HashMap<PageId, [u8; PAGE_SIZE]>>,
    /// `num_pages` as of `BEGIN`, restored on `ROLLBACK`.
    shadow_num_pages: Option<u32>,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_len = file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(Error::Corruption(
                "database file length is not a multiple of the page size".into(),
            ));
        }
        let num_pages = (file_len / PAGE_SIZE as u64) as u32;
        let mut slots = heapless::Vec::new();
        for _ in 0..CACHE_CAPACITY {
            slots
                .push(Slot::empty())
                .unwrap_or_else(|_| unreachable!("slots has exactly CACHE_CAPACITY capacity"));
        }
        Ok(Pager {
            file,
            num_pages,
            slots,
            index: std::collections::HashMap::new(),
            tick: 0,
            shadow: None,
            shadow_num_pages: None,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Appends one zero-filled page and returns its id. Pages are never
    /// reclaimed: a deleted page's slot is simply never revisited.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let id = self.num_pages;
        self.num_pages += 1;
        let slot = self.fault_in(id)?;
        self.slots[slot].data = [0u8; PAGE_SIZE];
        self.slots[slot].dirty = true;
        Ok(id)
    }

    pub fn get_page(&mut self, id: PageId) -> Result<&[u8]> {
        let slot = self.fault_in(id)?;
        self.tick += 1;
        self.slots[slot].last_used = self.tick;
        Ok(&self.slots[slot].data)
    }

    pub fn get_page_mut(&mut self, id: PageId) -> Result<&mut [u8]> {
        let slot = self.fault_in(id)?;
        if let Some(shadow) = self.shadow.as_ref() {
            if !shadow.contains_key(&id) {
                let snapshot = self.slots[slot].data;
                self.shadow.as_mut().unwrap().insert(id, snapshot);
            }
        }
        self.tick += 1;
        self.slots[slot].last_used = self.tick;
        self.slots[slot].dirty = true;
        Ok(&mut self.slots[slot].data)
    }

    /// True while a transaction opened by `begin_transaction` is active.
    pub fn in_transaction(&self) -> bool {
        self.shadow.is_some()
    }

    /// Opens a shadow-paging transaction (spec.md §4.6 `BEGIN`). Every page
    /// written for the first time afterwards has its prior bytes captured;
    /// `rollback_transaction` restores them.
    pub fn begin_transaction(&mut self) {
        self.shadow = Some(std::collections::HashMap::new());
        self.shadow_num_pages = Some(self.num_pages);
    }

    /// `COMMIT`: flushes every dirty page, writing the header page (0) last
    /// so a crash mid-commit leaves the pre-commit state on disk.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let mut dirty_ids: Vec<PageId> = self
            .index
            .iter()
            .filter(|(_, &slot)| self.slots[slot].dirty)
            .map(|(&id, _)| id)
            .collect();
        dirty_ids.sort_by_key(|&id| (id == 0, id));
        for id in dirty_ids {
            self.flush_page(id)?;
        }
        self.file.flush()?;
        self.shadow = None;
        self.shadow_num_pages = None;
        Ok(())
    }

    /// `ROLLBACK`: restores every shadowed page's cached contents and the
    /// pre-transaction page count, without touching disk. Pages allocated
    /// during the transaction are dropped from the cache entirely, so a
    /// later flush never writes them past the restored page count.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        if let Some(shadow) = self.shadow.take() {
            for (id, data) in shadow {
                if let Some(&slot) = self.index.get(&id) {
                    self.slots[slot].data = data;
                    self.slots[slot].dirty = false;
                }
            }
        }
        if let Some(n) = self.shadow_num_pages.take() {
            self.num_pages = n;
            let orphans: Vec<PageId> = self
                .index
                .keys()
                .copied()
                .filter(|&id| id >= n)
                .collect();
            for id in orphans {
                if let Some(slot) = self.index.remove(&id) {
                    self.slots[slot] = Slot::empty();
                }
            }
        }
        Ok(())
    }

    pub fn flush_page(&mut self, id: PageId) -> Result<()> {
        if let Some(&slot) = self.index.get(&id) {
            if self.slots[slot].dirty {
                let data = self.slots[slot].data;
                self.write_page_raw(id, &data)?;
                self.slots[slot].dirty = false;
                tracing::debug!(page_id = id, "flushed page");
            }
        }
        Ok(())
    }

    pub fn flush_all(&mut self) -> Result<()> {
        let dirty_ids: Vec<PageId> = self
            .index
            .iter()
            .filter(|(_, &slot)| self.slots[slot].dirty)
            .map(|(&id, _)| id)
            .collect();
        for id in dirty_ids {
            self.flush_page(id)?;
        }
        self.file.flush()?;
        Ok(())
    }

    /// Ensures `id` is resident and returns its slot index, evicting the
    /// least-recently-used non-pinned slot if the cache is full.
    fn fault_in(&mut self, id: PageId) -> Result<usize> {
        if let Some(&slot) = self.index.get(&id) {
            return Ok(slot);
        }

        let slot = if let Some(free) = self.slots.iter().position(|s| s.page_id.is_none()) {
            free
        } else {
            self.evict()?
        };

        let mut buf = [0u8; PAGE_SIZE];
        let offset = id as u64 * PAGE_SIZE as u64;
        if offset < self.file.metadata()?.len() {
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut buf)?;
        }
        self.slots[slot] = Slot {
            page_id: Some(id),
            data: buf,
            dirty: false,
            last_used: self.tick,
        };
        self.index.insert(id, slot);
        tracing::trace!(page_id = id, slot, "faulted in page");
        Ok(slot)
    }

    fn evict(&mut self) -> Result<usize> {
        // Page 0 is whatever slot holds it; never a candidate.
        let victim = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.page_id.map_or(false, |id| id != 0))
            .min_by_key(|(_, s)| s.last_used)
            .map(|(i, _)| i)
            .ok_or_else(|| Error::Storage("page cache exhausted: every slot pinned".into()))?;

        if self.slots[victim].dirty {
            let id = self.slots[victim].page_id.unwrap();
            let data = self.slots[victim].data;
            self.write_page_raw(id, &data)?;
            tracing::debug!(page_id = id, "evicted dirty page, flushed first");
        }
        if let Some(id) = self.slots[victim].page_id.take() {
            self.index.remove(&id);
        }
        Ok(victim)
    }

    fn write_page_raw(&mut self, id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let offset = id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }
}
