//! Flat list to ordered forest conversion
//!
//! The catalog arrives as rows that point at their parent by id. This module
//! turns those rows into an ordered forest without touching the network or any
//! shared state.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::{CategoryId, CategoryRecord, CategoryTreeNode, ParentRef};

/// Index of the record that owns each id. A later record with the same id
/// replaces an earlier one.
fn index_by_id(records: &[CategoryRecord]) -> HashMap<&CategoryId, usize> {
    let mut index = HashMap::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        index.insert(&record.id, position);
    }
    index
}

/// Builds an ordered forest from a flat, parent-pointer list of categories
///
/// Roots and siblings keep the order in which they appear in `records`.
///
/// Records that cannot be placed are dropped without error:
/// - a parent id that names no record (orphan), or a missing `parent` key
/// - a record on a parent cycle, and everything below it
/// - an earlier record whose id is reused later in the list
pub fn build_tree(records: &[CategoryRecord]) -> Vec<CategoryTreeNode> {
    let index = index_by_id(records);

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];

    for (position, record) in records.iter().enumerate() {
        if index.get(&record.id) != Some(&position) {
            debug!(id = %record.id, "duplicate category id, keeping the later record");
            continue;
        }

        match &record.parent {
            ParentRef::Root => roots.push(position),
            ParentRef::Category(parent_id) => match index.get(parent_id) {
                Some(&parent) => children[parent].push(position),
                None => debug!(id = %record.id, parent = %parent_id, "dropping orphan category"),
            },
            ParentRef::Unspecified => {
                debug!(id = %record.id, "dropping category without a parent field")
            }
        }
    }

    // Breadth-first from the roots. Anything on a cycle is never reached.
    let mut visited = vec![false; records.len()];
    let mut order = Vec::with_capacity(index.len());
    let mut queue = VecDeque::with_capacity(roots.len());
    for &root in &roots {
        visited[root] = true;
        queue.push_back(root);
    }
    while let Some(position) = queue.pop_front() {
        order.push(position);
        for &child in &children[position] {
            if !visited[child] {
                visited[child] = true;
                queue.push_back(child);
            }
        }
    }

    let unreachable = index.len() - order.len();
    if unreachable > 0 {
        debug!(unreachable, "categories not reachable from any root");
    }

    // Children always come after their parent in `order`, so walking it
    // backwards finishes every subtree before the node that holds it.
    let mut built: Vec<Option<CategoryTreeNode>> = vec![None; records.len()];
    for &position in order.iter().rev() {
        let kids = children[position]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[position] = Some(CategoryTreeNode {
            record: records[position].clone(),
            children: kids,
        });
    }

    roots
        .iter()
        .filter_map(|&root| built[root].take())
        .collect()
}

/// Returns the top-level categories in their original order
///
/// A record is top-level only when its parent is JSON `null`. This is a plain
/// filter in input order: a record with a reused id stays in the list even if
/// a later record with that id wins its place in [`build_tree`].
pub fn root_categories(records: &[CategoryRecord]) -> Vec<CategoryRecord> {
    records
        .iter()
        .filter(|record| record.parent.is_root())
        .cloned()
        .collect()
}
