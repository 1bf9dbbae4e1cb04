//! Page 0: magic, page size, root page, and the stats blob.
//!
//! Layout (host-endian, per spec.md §3/§6 — this format is not portable
//! between byte orders):
//!
//! ```text
//! offset  size  field
//! 0       8     magic
//! 8       4     format_version
//! 12      4     page_size
//! 16      4     root_page_id
//! 20      4     num_pages
//! 24      4     stats_offset (== 28, kept explicit per spec.md)
//! 28      ..    stats blob (see stats.rs)
//! ```

use super::stats::Stats;
use crate::error::{Error, Result};

pub const MAGIC: [u8; 8] = *b"SHELFDB\0";
pub const FORMAT_VERSION: u32 = 1;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 8;
const PAGE_SIZE_OFFSET: usize = 12;
const ROOT_PAGE_OFFSET: usize = 16;
const NUM_PAGES_OFFSET: usize = 20;
const STATS_OFFSET_OFFSET: usize = 24;
pub const STATS_OFFSET: usize = 28;

pub struct Header {
    pub page_size: u32,
    pub root_page_id: u32,
    pub num_pages: u32,
    pub stats: Stats,
}

impl Header {
    pub fn new(page_size: u32, root_page_id: u32, num_pages: u32) -> Self {
        Header {
            page_size,
            root_page_id,
            num_pages,
            stats: Stats::empty(),
        }
    }

    pub fn encode(&self, page: &mut [u8]) {
        page[MAGIC_OFFSET..MAGIC_OFFSET + 8].copy_from_slice(&MAGIC);
        page[VERSION_OFFSET..VERSION_OFFSET + 4].copy_from_slice(&FORMAT_VERSION.to_ne_bytes());
        page[PAGE_SIZE_OFFSET..PAGE_SIZE_OFFSET + 4].copy_from_slice(&self.page_size.to_ne_bytes());
        page[ROOT_PAGE_OFFSET..ROOT_PAGE_OFFSET + 4]
            .copy_from_slice(&self.root_page_id.to_ne_bytes());
        page[NUM_PAGES_OFFSET..NUM_PAGES_OFFSET + 4].copy_from_slice(&self.num_pages.to_ne_bytes());
        page[STATS_OFFSET_OFFSET..STATS_OFFSET_OFFSET + 4]
            .copy_from_slice(&(STATS_OFFSET as u32).to_ne_bytes());
        self.stats.encode(&mut page[STATS_OFFSET..]);
    }

    pub fn decode(page: &[u8], expected_page_size: u32) -> Result<Self> {
        if page.len() < STATS_OFFSET || page[MAGIC_OFFSET..MAGIC_OFFSET + 8] != MAGIC {
            return Err(Error::Corruption("bad magic".into()));
        }
        let page_size = u32_at(page, PAGE_SIZE_OFFSET);
        if page_size != expected_page_size {
            return Err(Error::Corruption(format!(
                "page size mismatch: file has {}, expected {}",
                page_size, expected_page_size
            )));
        }
        let version = u32_at(page, VERSION_OFFSET);
        if version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported format version {}",
                version
            )));
        }
        let root_page_id = u32_at(page, ROOT_PAGE_OFFSET);
        let num_pages = u32_at(page, NUM_PAGES_OFFSET);
        let stats_offset = u32_at(page, STATS_OFFSET_OFFSET) as usize;
        let stats = Stats::decode(&page[stats_offset..]);
        Ok(Header {
            page_size,
            root_page_id,
            num_pages,
            stats,
        })
    }
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes(buf[offset..offset + 4].try_into().unwrap())
}
