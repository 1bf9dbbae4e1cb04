//! Statistics blob (spec.md §4.7): row count, min/max id, distinct-value
//! estimates, and the last `ANALYZE` timestamp. Lives inline in the header
//! page and is updated incrementally on insert/delete, or wholesale by
//! `ANALYZE`.

use std::collections::HashSet;

/// Sentinel meaning "no bound known" — used for `min_id`/`max_id` when the
/// table is empty or the extremum has been invalidated by a delete.
pub const UNDEFINED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub row_count: u32,
    pub min_id: u32,
    pub max_id: u32,
    pub distinct_username: u32,
    pub distinct_email: u32,
    pub last_analyze_epoch: u32,
}

const FIELD_COUNT: usize = 6;
pub const ENCODED_SIZE: usize = FIELD_COUNT * 4;

impl Stats {
    pub fn empty() -> Self {
        Stats {
            row_count: 0,
            min_id: UNDEFINED,
            max_id: UNDEFINED,
            distinct_username: 0,
            distinct_email: 0,
            last_analyze_epoch: 0,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        let fields = [
            self.row_count,
            self.min_id,
            self.max_id,
            self.distinct_username,
            self.distinct_email,
            self.last_analyze_epoch,
        ];
        for (i, field) in fields.iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&field.to_ne_bytes());
        }
    }

    pub fn decode(buf: &[u8]) -> Self {
        let read = |i: usize| u32::from_ne_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
        Stats {
            row_count: read(0),
            min_id: read(1),
            max_id: read(2),
            distinct_username: read(3),
            distinct_email: read(4),
            last_analyze_epoch: read(5),
        }
    }

    /// Incremental update on insert of `key` (spec.md §4.7).
    pub fn on_insert(&mut self, key: u32) {
        self.row_count += 1;
        if self.min_id == UNDEFINED || key < self.min_id {
            self.min_id = key;
        }
        if self.max_id == UNDEFINED || key > self.max_id {
            self.max_id = key;
        }
    }

    /// Incremental update on delete of `key`. Invalidates min/max when the
    /// deleted key was an extreme; a later `ANALYZE` or insert repairs it.
    pub fn on_delete(&mut self, key: u32) {
        self.row_count = self.row_count.saturating_sub(1);
        if key == self.min_id || key == self.max_id {
            self.min_id = UNDEFINED;
            self.max_id = UNDEFINED;
        }
        if self.row_count == 0 {
            self.min_id = UNDEFINED;
            self.max_id = UNDEFINED;
        }
    }

    /// Full recompute from a scan of every row, as driven by `ANALYZE`.
    pub fn analyze<'a>(rows: impl Iterator<Item = (u32, &'a [u8], &'a [u8])>, epoch: u32) -> Self {
        let mut row_count = 0u32;
        let mut min_id = UNDEFINED;
        let mut max_id = UNDEFINED;
        let mut usernames = HashSet::new();
        let mut emails = HashSet::new();

        for (id, username, email) in rows {
            row_count += 1;
            if min_id == UNDEFINED || id < min_id {
                min_id = id;
            }
            if max_id == UNDEFINED || id > max_id {
                max_id = id;
            }
            usernames.insert(trim_nul(username).to_vec());
            emails.insert(trim_nul(email).to_vec());
        }

        Stats {
            row_count,
            min_id,
            max_id,
            distinct_username: usernames.len() as u32,
            distinct_email: emails.len() as u32,
            last_analyze_epoch: epoch,
        }
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}
