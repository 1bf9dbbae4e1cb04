//! B+ tree storage engine (spec.md §4.2).
//!
//! The teacher's `storage/btree.rs` models node headers and cells well but
//! stops at a single-leaf-root tutorial stage: its cursor never descends
//! through internal cells and it has no delete. This module generalizes the
//! teacher's split/new-root logic (and its node-header byte layout, moved to
//! `node.rs`) into a complete tree with multi-level descent, leaf/internal
//! splits, and delete with redistribution, merging, and root collapse.

use super::cursor::{self, Cursor};
use super::node::{self, NodeType, INVALID_PAGE_ID};
use super::pager::{PageId, Pager};
use super::row::{Row, ROW_SIZE};
use crate::error::{Error, Result};

#[derive(Clone, Copy)]
pub struct BTree {
    root_page_id: PageId,
}

impl BTree {
    pub fn new(root_page_id: PageId) -> Self {
        BTree { root_page_id }
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Allocates a fresh, empty root leaf for a brand-new database file.
    pub fn create(pager: &mut Pager) -> Result<Self> {
        let root = pager.allocate_page()?;
        let page = pager.get_page_mut(root)?;
        node::init_leaf(page);
        node::set_is_root(page, true);
        Ok(BTree { root_page_id: root })
    }

    pub fn search(&self, pager: &mut Pager, key: u32) -> Result<Option<Row>> {
        let leaf = cursor::find_leaf(pager, self.root_page_id, key)?;
        let page = pager.get_page(leaf)?;
        let idx = node::leaf_find_slot(page, key);
        if idx < node::leaf_num_cells(page) as usize && node::leaf_key(page, idx) == key {
            Ok(Some(Row::decode(node::leaf_value(page, idx))?))
        } else {
            Ok(None)
        }
    }

    pub fn seek(&self, pager: &mut Pager, key: u32) -> Result<Cursor> {
        cursor::seek(pager, self.root_page_id, key)
    }

    pub fn seek_start(&self, pager: &mut Pager) -> Result<Cursor> {
        cursor::seek_start(pager, self.root_page_id)
    }

    pub fn insert(&mut self, pager: &mut Pager, row: Row) -> Result<()> {
        let key = row.id;
        let leaf = cursor::find_leaf(pager, self.root_page_id, key)?;
        let page = pager.get_page(leaf)?;
        let idx = node::leaf_find_slot(page, key);
        let num_cells = node::leaf_num_cells(page) as usize;
        if idx < num_cells && node::leaf_key(page, idx) == key {
            return Err(Error::DuplicateKey(key));
        }
        if num_cells < node::LEAF_MAX_CELLS {
            self.leaf_insert_nonfull(pager, leaf, idx, &row)?;
        } else {
            self.leaf_split_and_insert(pager, leaf, idx, &row)?;
        }
        tracing::debug!(key, "inserted row");
        Ok(())
    }

    pub fn update(&mut self, pager: &mut Pager, row: Row) -> Result<()> {
        let leaf = cursor::find_leaf(pager, self.root_page_id, row.id)?;
        let page = pager.get_page(leaf)?;
        let idx = node::leaf_find_slot(page, row.id);
        if idx >= node::leaf_num_cells(page) as usize || node::leaf_key(page, idx) != row.id {
            return Err(Error::NotFound(row.id));
        }
        let mut buf = [0u8; ROW_SIZE];
        row.encode(&mut buf);
        let page = pager.get_page_mut(leaf)?;
        node::set_leaf_value(page, idx, &buf);
        tracing::debug!(key = row.id, "updated row");
        Ok(())
    }

    pub fn delete(&mut self, pager: &mut Pager, key: u32) -> Result<()> {
        let leaf = cursor::find_leaf(pager, self.root_page_id, key)?;
        let page = pager.get_page(leaf)?;
        let idx = node::leaf_find_slot(page, key);
        let num_cells = node::leaf_num_cells(page) as usize;
        if idx >= num_cells || node::leaf_key(page, idx) != key {
            return Err(Error::NotFound(key));
        }
        let was_last = idx == num_cells - 1;

        {
            let page = pager.get_page_mut(leaf)?;
            node::leaf_shift_left(page, idx, num_cells);
            node::set_leaf_num_cells(page, (num_cells - 1) as u32);
        }

        if was_last {
            let new_max = {
                let page = pager.get_page(leaf)?;
                let n = node::leaf_num_cells(page) as usize;
                if n > 0 {
                    Some(node::leaf_key(page, n - 1))
                } else {
                    None
                }
            };
            if let Some(m) = new_max {
                self.update_ancestor_key(pager, leaf, m)?;
            }
        }

        let (is_root, cells_left) = {
            let page = pager.get_page(leaf)?;
            (node::is_root(page), node::leaf_num_cells(page) as usize)
        };
        if !is_root && cells_left < node::LEAF_MIN_CELLS {
            self.fix_leaf_underflow(pager, leaf)?;
        }
        tracing::debug!(key, "deleted row");
        Ok(())
    }

    // --- Leaf insert/split ---

    fn leaf_insert_nonfull(
        &mut self,
        pager: &mut Pager,
        leaf: PageId,
        idx: usize,
        row: &Row,
    ) -> Result<()> {
        let mut buf = [0u8; ROW_SIZE];
        row.encode(&mut buf);
        let page = pager.get_page_mut(leaf)?;
        let num_cells = node::leaf_num_cells(page) as usize;
        node::leaf_shift_right(page, idx, num_cells);
        node::set_leaf_key(page, idx, row.id);
        node::set_leaf_value(page, idx, &buf);
        node::set_leaf_num_cells(page, (num_cells + 1) as u32);
        if idx == num_cells {
            self.update_ancestor_key(pager, leaf, row.id)?;
        }
        Ok(())
    }

    fn leaf_split_and_insert(
        &mut self,
        pager: &mut Pager,
        leaf: PageId,
        idx: usize,
        row: &Row,
    ) -> Result<()> {
        let mut new_row_bytes = [0u8; ROW_SIZE];
        row.encode(&mut new_row_bytes);

        let mut entries: Vec<(u32, [u8; ROW_SIZE])> = {
            let page = pager.get_page(leaf)?;
            (0..node::LEAF_MAX_CELLS)
                .map(|i| {
                    let mut v = [0u8; ROW_SIZE];
                    v.copy_from_slice(node::leaf_value(page, i));
                    (node::leaf_key(page, i), v)
                })
                .collect()
        };
        entries.insert(idx, (row.id, new_row_bytes));

        let left_count = node::LEAF_LEFT_SPLIT_COUNT;
        let right_count = node::LEAF_RIGHT_SPLIT_COUNT;

        let (old_next, old_parent, was_root) = {
            let page = pager.get_page(leaf)?;
            (
                node::leaf_next_leaf(page),
                node::parent_page_id(page),
                node::is_root(page),
            )
        };

        let new_leaf = pager.allocate_page()?;

        {
            let page = pager.get_page_mut(leaf)?;
            node::init_leaf(page);
            node::set_parent_page_id(page, old_parent);
            node::set_leaf_next_leaf(page, new_leaf);
            for (i, (k, v)) in entries[..left_count].iter().enumerate() {
                node::set_leaf_key(page, i, *k);
                node::set_leaf_value(page, i, v);
            }
            node::set_leaf_num_cells(page, left_count as u32);
        }
        {
            let page = pager.get_page_mut(new_leaf)?;
            node::init_leaf(page);
            node::set_parent_page_id(page, old_parent);
            node::set_leaf_next_leaf(page, old_next);
            for (i, (k, v)) in entries[left_count..].iter().enumerate() {
                node::set_leaf_key(page, i, *k);
                node::set_leaf_value(page, i, v);
            }
            node::set_leaf_num_cells(page, right_count as u32);
        }

        let left_max = entries[left_count - 1].0;
        let right_max = entries[left_count + right_count - 1].0;

        if was_root {
            self.create_new_root(pager, leaf, new_leaf, left_max)?;
        } else {
            self.insert_into_parent(pager, old_parent, leaf, left_max, new_leaf, right_max)?;
        }
        tracing::debug!(leaf, new_leaf, "split leaf page");
        Ok(())
    }

    fn create_new_root(
        &mut self,
        pager: &mut Pager,
        left: PageId,
        right: PageId,
        left_max: u32,
    ) -> Result<()> {
        let new_root = pager.allocate_page()?;
        {
            let page = pager.get_page_mut(new_root)?;
            node::init_internal(page);
            node::set_is_root(page, true);
            node::set_internal_num_keys(page, 1);
            node::set_internal_child(page, 0, left);
            node::set_internal_key(page, 0, left_max);
            node::set_internal_right_child(page, right);
        }
        {
            let page = pager.get_page_mut(left)?;
            node::set_is_root(page, false);
            node::set_parent_page_id(page, new_root);
        }
        {
            let page = pager.get_page_mut(right)?;
            node::set_parent_page_id(page, new_root);
        }
        self.root_page_id = new_root;
        tracing::debug!(new_root, left, right, "created new root");
        Ok(())
    }

    /// Inserts `right` immediately after `left` in `parent`, using `left_max`
    /// as the new separator. Splits `parent` (recursively, up to the root)
    /// if it overflows.
    fn insert_into_parent(
        &mut self,
        pager: &mut Pager,
        parent: PageId,
        left: PageId,
        left_max: u32,
        right: PageId,
        right_max: u32,
    ) -> Result<()> {
        let (mut children, mut keys) = self.internal_entries(pager, parent)?;
        let pos = children
            .iter()
            .position(|&c| c == left)
            .ok_or_else(|| Error::Storage("child missing from parent during split".into()))?;
        children.insert(pos + 1, right);
        keys.insert(pos, left_max);

        let became_rightmost = pos + 1 == children.len() - 1;

        if keys.len() <= node::INTERNAL_MAX_KEYS {
            self.write_internal_entries(pager, parent, &children, &keys)?;
            {
                let page = pager.get_page_mut(right)?;
                node::set_parent_page_id(page, parent);
            }
            if became_rightmost {
                self.update_ancestor_key(pager, parent, right_max)?;
            }
            return Ok(());
        }

        let was_root = {
            let page = pager.get_page(parent)?;
            node::is_root(page)
        };
        let grandparent = {
            let page = pager.get_page(parent)?;
            node::parent_page_id(page)
        };

        let mid = keys.len() / 2;
        let promoted = keys[mid];
        let left_children = children[..=mid].to_vec();
        let left_keys = keys[..mid].to_vec();
        let right_children = children[mid + 1..].to_vec();
        let right_keys = keys[mid + 1..].to_vec();

        let new_internal = pager.allocate_page()?;
        {
            let page = pager.get_page_mut(new_internal)?;
            node::init_internal(page);
        }
        self.write_internal_entries(pager, parent, &left_children, &left_keys)?;
        self.write_internal_entries(pager, new_internal, &right_children, &right_keys)?;
        for &c in &left_children {
            let page = pager.get_page_mut(c)?;
            node::set_parent_page_id(page, parent);
        }
        for &c in &right_children {
            let page = pager.get_page_mut(c)?;
            node::set_parent_page_id(page, new_internal);
        }

        if was_root {
            self.create_new_root(pager, parent, new_internal, promoted)?;
        } else {
            self.insert_into_parent(pager, grandparent, parent, promoted, new_internal, right_max)?;
        }
        tracing::debug!(parent, new_internal, "split internal page");
        Ok(())
    }

    fn internal_entries(&self, pager: &mut Pager, node_id: PageId) -> Result<(Vec<PageId>, Vec<u32>)> {
        let page = pager.get_page(node_id)?;
        let num_keys = node::internal_num_keys(page) as usize;
        let mut children: Vec<PageId> = (0..num_keys).map(|i| node::internal_child(page, i)).collect();
        let keys: Vec<u32> = (0..num_keys).map(|i| node::internal_key(page, i)).collect();
        children.push(node::internal_right_child(page));
        Ok((children, keys))
    }

    fn write_internal_entries(
        &self,
        pager: &mut Pager,
        node_id: PageId,
        children: &[PageId],
        keys: &[u32],
    ) -> Result<()> {
        let page = pager.get_page_mut(node_id)?;
        for (i, k) in keys.iter().enumerate() {
            node::set_internal_child(page, i, children[i]);
            node::set_internal_key(page, i, *k);
        }
        node::set_internal_right_child(page, *children.last().unwrap());
        node::set_internal_num_keys(page, keys.len() as u32);
        Ok(())
    }

    /// Patches the separator key for `child`'s subtree in its parent after
    /// `child`'s maximum key changes, propagating upward if `child` is its
    /// parent's rightmost subtree (which carries no explicit key of its own).
    fn update_ancestor_key(&mut self, pager: &mut Pager, mut child: PageId, new_max: u32) -> Result<()> {
        loop {
            let parent_id = {
                let page = pager.get_page(child)?;
                node::parent_page_id(page)
            };
            if parent_id == INVALID_PAGE_ID {
                return Ok(());
            }
            let found_idx = {
                let page = pager.get_page(parent_id)?;
                let num_keys = node::internal_num_keys(page) as usize;
                (0..num_keys).find(|&i| node::internal_child(page, i) == child)
            };
            match found_idx {
                Some(i) => {
                    let page = pager.get_page_mut(parent_id)?;
                    node::set_internal_key(page, i, new_max);
                    return Ok(());
                }
                None => {
                    child = parent_id;
                }
            }
        }
    }

    // --- Delete: redistribution, merge, root collapse ---

    fn child_index(&self, pager: &mut Pager, parent: PageId, child: PageId) -> Result<(usize, usize)> {
        let page = pager.get_page(parent)?;
        let num_keys = node::internal_num_keys(page) as usize;
        for i in 0..=num_keys {
            if node::internal_child_at(page, i) == child {
                return Ok((i, num_keys));
            }
        }
        Err(Error::Storage("child not found in parent".into()))
    }

    fn siblings(
        &self,
        pager: &mut Pager,
        parent: PageId,
        child: PageId,
    ) -> Result<(Option<PageId>, usize, Option<PageId>)> {
        let page = pager.get_page(parent)?;
        let num_keys = node::internal_num_keys(page) as usize;
        let mut idx = None;
        for i in 0..=num_keys {
            if node::internal_child_at(page, i) == child {
                idx = Some(i);
                break;
            }
        }
        let idx = idx.ok_or_else(|| Error::Storage("child not found in parent".into()))?;
        let left = if idx > 0 {
            Some(node::internal_child_at(page, idx - 1))
        } else {
            None
        };
        let right = if idx < num_keys {
            Some(node::internal_child_at(page, idx + 1))
        } else {
            None
        };
        Ok((left, idx, right))
    }

    fn subtree_max(&self, pager: &mut Pager, mut page_id: PageId) -> Result<Option<u32>> {
        loop {
            let page = pager.get_page(page_id)?;
            match node::node_type(page)? {
                NodeType::Leaf => {
                    let n = node::leaf_num_cells(page) as usize;
                    return Ok(if n == 0 { None } else { Some(node::leaf_key(page, n - 1)) });
                }
                NodeType::Internal => {
                    page_id = node::internal_right_child(page);
                }
            }
        }
    }

    fn remove_parent_entry_for_merge(
        &mut self,
        pager: &mut Pager,
        parent: PageId,
        left_idx: usize,
        merged_into: PageId,
    ) -> Result<()> {
        let num_keys = {
            let page = pager.get_page(parent)?;
            node::internal_num_keys(page) as usize
        };
        let right_idx = left_idx + 1;
        let page = pager.get_page_mut(parent)?;
        if right_idx == num_keys {
            node::set_internal_right_child(page, merged_into);
        } else {
            node::set_internal_child(page, right_idx, merged_into);
        }
        node::internal_shift_left(page, left_idx, num_keys);
        node::set_internal_num_keys(page, (num_keys - 1) as u32);
        Ok(())
    }

    fn fix_leaf_underflow(&mut self, pager: &mut Pager, leaf: PageId) -> Result<()> {
        let (parent_id, is_root) = {
            let page = pager.get_page(leaf)?;
            (node::parent_page_id(page), node::is_root(page))
        };
        if is_root {
            return Ok(());
        }
        let (left_sib, my_idx, right_sib) = self.siblings(pager, parent_id, leaf)?;

        if let Some(right) = right_sib {
            let right_cells = {
                let page = pager.get_page(right)?;
                node::leaf_num_cells(page) as usize
            };
            if right_cells > node::LEAF_MIN_CELLS {
                self.borrow_from_right_leaf(pager, leaf, right, parent_id, my_idx)?;
                return Ok(());
            }
        }
        if let Some(left) = left_sib {
            let left_cells = {
                let page = pager.get_page(left)?;
                node::leaf_num_cells(page) as usize
            };
            if left_cells > node::LEAF_MIN_CELLS {
                self.borrow_from_left_leaf(pager, left, leaf, parent_id, my_idx)?;
                return Ok(());
            }
        }
        if let Some(left) = left_sib {
            self.merge_leaves(pager, left, leaf, parent_id)?;
        } else if let Some(right) = right_sib {
            self.merge_leaves(pager, leaf, right, parent_id)?;
        }
        self.fix_internal_underflow(pager, parent_id)
    }

    fn borrow_from_right_leaf(
        &mut self,
        pager: &mut Pager,
        leaf: PageId,
        right: PageId,
        parent: PageId,
        my_idx: usize,
    ) -> Result<()> {
        let (key, value) = {
            let page = pager.get_page(right)?;
            let mut v = [0u8; ROW_SIZE];
            v.copy_from_slice(node::leaf_value(page, 0));
            (node::leaf_key(page, 0), v)
        };
        {
            let page = pager.get_page_mut(leaf)?;
            let n = node::leaf_num_cells(page) as usize;
            node::set_leaf_key(page, n, key);
            node::set_leaf_value(page, n, &value);
            node::set_leaf_num_cells(page, (n + 1) as u32);
        }
        {
            let page = pager.get_page_mut(right)?;
            let n = node::leaf_num_cells(page) as usize;
            node::leaf_shift_left(page, 0, n);
            node::set_leaf_num_cells(page, (n - 1) as u32);
        }
        let page = pager.get_page_mut(parent)?;
        node::set_internal_key(page, my_idx, key);
        Ok(())
    }

    fn borrow_from_left_leaf(
        &mut self,
        pager: &mut Pager,
        left: PageId,
        leaf: PageId,
        parent: PageId,
        my_idx: usize,
    ) -> Result<()> {
        let (key, value, new_left_max) = {
            let page = pager.get_page(left)?;
            let n = node::leaf_num_cells(page) as usize;
            let mut v = [0u8; ROW_SIZE];
            v.copy_from_slice(node::leaf_value(page, n - 1));
            (node::leaf_key(page, n - 1), v, node::leaf_key(page, n - 2))
        };
        {
            let page = pager.get_page_mut(left)?;
            let n = node::leaf_num_cells(page) as usize;
            node::set_leaf_num_cells(page, (n - 1) as u32);
        }
        {
            let page = pager.get_page_mut(leaf)?;
            let n = node::leaf_num_cells(page) as usize;
            node::leaf_shift_right(page, 0, n);
            node::set_leaf_key(page, 0, key);
            node::set_leaf_value(page, 0, &value);
            node::set_leaf_num_cells(page, (n + 1) as u32);
        }
        let page = pager.get_page_mut(parent)?;
        node::set_internal_key(page, my_idx - 1, new_left_max);
        Ok(())
    }

    fn merge_leaves(&mut self, pager: &mut Pager, left: PageId, right: PageId, parent: PageId) -> Result<()> {
        let right_next = {
            let page = pager.get_page(right)?;
            node::leaf_next_leaf(page)
        };
        let right_entries: Vec<(u32, [u8; ROW_SIZE])> = {
            let page = pager.get_page(right)?;
            let n = node::leaf_num_cells(page) as usize;
            (0..n)
                .map(|i| {
                    let mut v = [0u8; ROW_SIZE];
                    v.copy_from_slice(node::leaf_value(page, i));
                    (node::leaf_key(page, i), v)
                })
                .collect()
        };
        {
            let page = pager.get_page_mut(left)?;
            let mut n = node::leaf_num_cells(page) as usize;
            for (k, v) in &right_entries {
                node::set_leaf_key(page, n, *k);
                node::set_leaf_value(page, n, v);
                n += 1;
            }
            node::set_leaf_num_cells(page, n as u32);
            node::set_leaf_next_leaf(page, right_next);
        }

        let (left_idx, num_keys) = self.child_index(pager, parent, left)?;
        let was_rightmost = left_idx + 1 == num_keys;
        self.remove_parent_entry_for_merge(pager, parent, left_idx, left)?;
        if was_rightmost {
            if let Some(new_max) = self.subtree_max(pager, left)? {
                self.update_ancestor_key(pager, parent, new_max)?;
            }
        }
        tracing::debug!(left, right, "merged leaf pages");
        Ok(())
    }

    fn fix_internal_underflow(&mut self, pager: &mut Pager, node_id: PageId) -> Result<()> {
        let (parent_id, is_root, num_keys) = {
            let page = pager.get_page(node_id)?;
            (
                node::parent_page_id(page),
                node::is_root(page),
                node::internal_num_keys(page) as usize,
            )
        };
        if is_root {
            if num_keys == 0 {
                let only_child = {
                    let page = pager.get_page(node_id)?;
                    node::internal_right_child(page)
                };
                {
                    let page = pager.get_page_mut(only_child)?;
                    node::set_is_root(page, true);
                    node::set_parent_page_id(page, INVALID_PAGE_ID);
                }
                self.root_page_id = only_child;
                tracing::debug!(new_root = only_child, "collapsed root after merge");
            }
            return Ok(());
        }
        if num_keys >= node::INTERNAL_MIN_KEYS {
            return Ok(());
        }

        let (left_sib, my_idx, right_sib) = self.siblings(pager, parent_id, node_id)?;

        if let Some(right) = right_sib {
            let right_keys = {
                let page = pager.get_page(right)?;
                node::internal_num_keys(page) as usize
            };
            if right_keys > node::INTERNAL_MIN_KEYS {
                self.borrow_from_right_internal(pager, node_id, right, parent_id, my_idx)?;
                return Ok(());
            }
        }
        if let Some(left) = left_sib {
            let left_keys = {
                let page = pager.get_page(left)?;
                node::internal_num_keys(page) as usize
            };
            if left_keys > node::INTERNAL_MIN_KEYS {
                self.borrow_from_left_internal(pager, left, node_id, parent_id, my_idx)?;
                return Ok(());
            }
        }
        if let Some(left) = left_sib {
            self.merge_internals(pager, left, node_id, parent_id)?;
        } else if let Some(right) = right_sib {
            self.merge_internals(pager, node_id, right, parent_id)?;
        }
        self.fix_internal_underflow(pager, parent_id)
    }

    fn borrow_from_right_internal(
        &mut self,
        pager: &mut Pager,
        node_id: PageId,
        right: PageId,
        parent: PageId,
        my_idx: usize,
    ) -> Result<()> {
        let sep_key = {
            let page = pager.get_page(parent)?;
            node::internal_key(page, my_idx)
        };
        let borrowed_child = {
            let page = pager.get_page(right)?;
            node::internal_child(page, 0)
        };
        let new_sep = {
            let page = pager.get_page(right)?;
            node::internal_key(page, 0)
        };
        {
            let page = pager.get_page_mut(node_id)?;
            let n = node::internal_num_keys(page) as usize;
            let old_right_child = node::internal_right_child(page);
            node::set_internal_child(page, n, old_right_child);
            node::set_internal_key(page, n, sep_key);
            node::set_internal_right_child(page, borrowed_child);
            node::set_internal_num_keys(page, (n + 1) as u32);
        }
        {
            let page = pager.get_page_mut(borrowed_child)?;
            node::set_parent_page_id(page, node_id);
        }
        {
            let page = pager.get_page_mut(right)?;
            let n = node::internal_num_keys(page) as usize;
            node::internal_shift_left(page, 0, n);
            node::set_internal_num_keys(page, (n - 1) as u32);
        }
        let page = pager.get_page_mut(parent)?;
        node::set_internal_key(page, my_idx, new_sep);
        Ok(())
    }

    fn borrow_from_left_internal(
        &mut self,
        pager: &mut Pager,
        left: PageId,
        node_id: PageId,
        parent: PageId,
        my_idx: usize,
    ) -> Result<()> {
        let sep_idx = my_idx - 1;
        let sep_key = {
            let page = pager.get_page(parent)?;
            node::internal_key(page, sep_idx)
        };
        let (promoted_child, new_left_max) = {
            let page = pager.get_page(left)?;
            let n = node::internal_num_keys(page) as usize;
            (node::internal_right_child(page), node::internal_key(page, n - 1))
        };
        {
            let page = pager.get_page_mut(left)?;
            let n = node::internal_num_keys(page) as usize;
            let new_right_child = node::internal_child(page, n - 1);
            node::set_internal_right_child(page, new_right_child);
            node::set_internal_num_keys(page, (n - 1) as u32);
        }
        {
            let page = pager.get_page_mut(node_id)?;
            let n = node::internal_num_keys(page) as usize;
            node::internal_shift_right(page, 0, n);
            node::set_internal_child(page, 0, promoted_child);
            node::set_internal_key(page, 0, sep_key);
            node::set_internal_num_keys(page, (n + 1) as u32);
        }
        {
            let page = pager.get_page_mut(promoted_child)?;
            node::set_parent_page_id(page, node_id);
        }
        let page = pager.get_page_mut(parent)?;
        node::set_internal_key(page, sep_idx, new_left_max);
        Ok(())
    }

    fn merge_internals(&mut self, pager: &mut Pager, left: PageId, right: PageId, parent: PageId) -> Result<()> {
        let (left_idx, num_keys) = self.child_index(pager, parent, left)?;
        let sep_key = {
            let page = pager.get_page(parent)?;
            node::internal_key(page, left_idx)
        };
        let right_entries: Vec<(PageId, u32)> = {
            let page = pager.get_page(right)?;
            let n = node::internal_num_keys(page) as usize;
            (0..n).map(|i| (node::internal_child(page, i), node::internal_key(page, i))).collect()
        };
        let right_right_child = {
            let page = pager.get_page(right)?;
            node::internal_right_child(page)
        };
        let mut reparented: Vec<PageId> = right_entries.iter().map(|(c, _)| *c).collect();
        reparented.push(right_right_child);

        {
            let page = pager.get_page_mut(left)?;
            let mut n = node::internal_num_keys(page) as usize;
            let old_right_child = node::internal_right_child(page);
            node::set_internal_child(page, n, old_right_child);
            node::set_internal_key(page, n, sep_key);
            n += 1;
            for (child, key) in &right_entries {
                node::set_internal_child(page, n, *child);
                node::set_internal_key(page, n, *key);
                n += 1;
            }
            node::set_internal_right_child(page, right_right_child);
            node::set_internal_num_keys(page, n as u32);
        }
        for child in reparented {
            let page = pager.get_page_mut(child)?;
            node::set_parent_page_id(page, left);
        }

        let was_rightmost = left_idx + 1 == num_keys;
        self.remove_parent_entry_for_merge(pager, parent, left_idx, left)?;
        if was_rightmost {
            if let Some(new_max) = self.subtree_max(pager, left)? {
                self.update_ancestor_key(pager, parent, new_max)?;
            }
        }
        tracing::debug!(left, right, "merged internal pages");
        Ok(())
    }
}

/// One diagnostic line per allocated page, in page-id order, for `.btree`.
pub fn dump_pages(pager: &mut Pager) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for id in 1..pager.num_pages() {
        let page = pager.get_page(id)?;
        let line = match node::node_type(page)? {
            NodeType::Leaf => format!(
                "page {} leaf cells={} is_root={} parent={}",
                id,
                node::leaf_num_cells(page),
                node::is_root(page),
                node::parent_page_id(page)
            ),
            NodeType::Internal => format!(
                "page {} internal keys={} is_root={} parent={}",
                id,
                node::internal_num_keys(page),
                node::is_root(page),
                node::parent_page_id(page)
            ),
        };
        lines.push(line);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tree() -> (Pager, BTree) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut pager = Pager::open(&path).unwrap();
        // Reserve page 0 for the header, matching the on-disk layout.
        pager.allocate_page().unwrap();
        let tree = BTree::create(&mut pager).unwrap();
        (pager, tree)
    }

    #[test]
    fn insert_and_search_round_trip() {
        let (mut pager, mut tree) = open_tree();
        for i in 0..5u32 {
            tree.insert(&mut pager, Row::new(i, "u", "e@x.com").unwrap()).unwrap();
        }
        for i in 0..5u32 {
            let row = tree.search(&mut pager, i).unwrap().unwrap();
            assert_eq!(row.id, i);
        }
        assert!(tree.search(&mut pager, 99).unwrap().is_none());
    }

    #[test]
    fn insert_duplicate_key_fails() {
        let (mut pager, mut tree) = open_tree();
        tree.insert(&mut pager, Row::new(1, "a", "a@x.com").unwrap()).unwrap();
        let err = tree.insert(&mut pager, Row::new(1, "b", "b@x.com").unwrap()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(1)));
    }

    #[test]
    fn insert_enough_rows_to_force_a_split_and_still_finds_everything() {
        let (mut pager, mut tree) = open_tree();
        let n = (node::LEAF_MAX_CELLS as u32) * 3 + 7;
        for i in 0..n {
            tree.insert(&mut pager, Row::new(i, "user", "user@example.com").unwrap()).unwrap();
        }
        for i in 0..n {
            assert_eq!(tree.search(&mut pager, i).unwrap().unwrap().id, i);
        }
    }

    #[test]
    fn delete_after_split_keeps_remaining_rows_reachable() {
        let (mut pager, mut tree) = open_tree();
        let n = (node::LEAF_MAX_CELLS as u32) * 2 + 3;
        for i in 0..n {
            tree.insert(&mut pager, Row::new(i, "u", "u@x.com").unwrap()).unwrap();
        }
        for i in (0..n).step_by(2) {
            tree.delete(&mut pager, i).unwrap();
        }
        for i in 0..n {
            let found = tree.search(&mut pager, i).unwrap();
            if i % 2 == 0 {
                assert!(found.is_none());
            } else {
                assert_eq!(found.unwrap().id, i);
            }
        }
    }

    #[test]
    fn delete_missing_key_fails() {
        let (mut pager, mut tree) = open_tree();
        tree.insert(&mut pager, Row::new(1, "a", "a@x.com").unwrap()).unwrap();
        assert!(matches!(tree.delete(&mut pager, 2).unwrap_err(), Error::NotFound(2)));
    }

    #[test]
    fn update_changes_value_without_changing_key() {
        let (mut pager, mut tree) = open_tree();
        tree.insert(&mut pager, Row::new(1, "old", "old@x.com").unwrap()).unwrap();
        tree.update(&mut pager, Row::new(1, "new", "new@x.com").unwrap()).unwrap();
        let row = tree.search(&mut pager, 1).unwrap().unwrap();
        assert_eq!(row.username_str(), "new");
    }

    #[test]
    fn full_scan_via_cursor_visits_keys_in_order() {
        let (mut pager, mut tree) = open_tree();
        let n = (node::LEAF_MAX_CELLS as u32) * 2 + 1;
        for i in (0..n).rev() {
            tree.insert(&mut pager, Row::new(i, "u", "u@x.com").unwrap()).unwrap();
        }
        let mut cursor = tree.seek_start(&mut pager).unwrap();
        let mut seen = Vec::new();
        while !cursor.is_end() {
            seen.push(cursor.key(&mut pager).unwrap());
            cursor.advance(&mut pager).unwrap();
        }
        let expected: Vec<u32> = (0..n).collect();
        assert_eq!(seen, expected);
    }
}
