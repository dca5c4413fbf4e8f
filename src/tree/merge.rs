//! Ordered precedence merge of scanned reference trees.
//!
//! A `RefTree` is the nested `image → tag → (platform →) reference` mapping
//! shared by the scanner, the collector and the persisted digest map. Keys are
//! kept in a `BTreeMap`, so serialization order never depends on the order in
//! which directories were walked.
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefTree {
    Leaf(String),
    Branch(BTreeMap<String, RefTree>),
}

impl Default for RefTree {
    fn default() -> Self {
        RefTree::Branch(BTreeMap::new())
    }
}

impl RefTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` at `path`, creating branches on the way. Branches always
    /// win a shape conflict: a leaf sitting where a branch is needed is
    /// replaced, and a leaf inserted over an existing branch is dropped.
    /// Returns false when either of those happened.
    pub fn insert<S: AsRef<str>>(&mut self, path: &[S], value: String) -> bool {
        let Some((last, parents)) = path.split_last() else {
            *self = RefTree::Leaf(value);
            return true;
        };

        let mut displaced = false;
        let mut node = self;
        for key in parents {
            if let RefTree::Leaf(_) = node {
                *node = RefTree::new();
                displaced = true;
            }
            let RefTree::Branch(children) = node else {
                unreachable!("node was just made a branch");
            };
            node = children
                .entry(key.as_ref().to_string())
                .or_insert_with(RefTree::new);
        }

        if let RefTree::Leaf(_) = node {
            *node = RefTree::new();
            displaced = true;
        }
        let RefTree::Branch(children) = node else {
            unreachable!("node was just made a branch");
        };
        match children.entry(last.as_ref().to_string()) {
            Entry::Occupied(mut slot) => match slot.get() {
                RefTree::Branch(_) => false,
                RefTree::Leaf(_) => {
                    slot.insert(RefTree::Leaf(value));
                    !displaced
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(RefTree::Leaf(value));
                !displaced
            }
        }
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&RefTree> {
        let mut node = self;
        for key in path {
            match node {
                RefTree::Branch(children) => node = children.get(key.as_ref())?,
                RefTree::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    pub fn leaf<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        match self.get(path)? {
            RefTree::Leaf(value) => Some(value),
            RefTree::Branch(_) => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, RefTree>> {
        match self {
            RefTree::Branch(children) => Some(children),
            RefTree::Leaf(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RefTree::Leaf(_) => false,
            RefTree::Branch(children) => children.is_empty(),
        }
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            RefTree::Leaf(_) => 1,
            RefTree::Branch(children) => children.values().map(RefTree::leaf_count).sum(),
        }
    }

    /// Every leaf as (key path, value), in key order.
    pub fn leaves(&self) -> Vec<(Vec<String>, &str)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a str)>) {
        match self {
            RefTree::Leaf(value) => out.push((prefix.clone(), value.as_str())),
            RefTree::Branch(children) => {
                for (key, child) in children {
                    prefix.push(key.clone());
                    child.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }

    /// Drop branches that ended up without any leaf below them.
    pub fn compact(&mut self) {
        if let RefTree::Branch(children) = self {
            for child in children.values_mut() {
                child.compact();
            }
            children.retain(|_, child| !child.is_empty());
        }
    }

    /// Deep key-wise override: `top` wins on every key it defines, keys only
    /// present in `self` are kept.
    pub fn overlay(&mut self, top: RefTree) {
        match (self, top) {
            (RefTree::Branch(base), RefTree::Branch(top)) => {
                for (key, value) in top {
                    match base.entry(key) {
                        Entry::Occupied(mut slot) => slot.get_mut().overlay(value),
                        Entry::Vacant(slot) => {
                            slot.insert(value);
                        }
                    }
                }
            }
            (base, top) => *base = top,
        }
    }
}

/// Merge trees ordered from lowest to highest precedence.
pub fn merge_ordered<I>(trees: I) -> RefTree
where
    I: IntoIterator<Item = RefTree>,
{
    let mut merged = RefTree::new();
    for tree in trees {
        merged.overlay(tree);
    }
    merged.compact();
    merged
}
