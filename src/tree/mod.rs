//! In-memory category hierarchy.
//!
//! The tree is rebuilt from the flat category list on every read and never
//! persisted. Nodes live in an arena keyed by category pk; each node keeps
//! its children in insertion order and a back-reference to its parent.
//! Traversals use an explicit stack, so deep hierarchies do not grow the
//! call stack.

pub mod outline;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{AppError, AppResult};
use crate::models::Category;

pub use outline::read_outline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: i64,
    pub name: String,
    pub parent: Option<i64>,
    pub children: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTree {
    nodes: HashMap<i64, TreeNode>,
    roots: Vec<i64>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the tree from a flat category list in any order. A record
    /// whose parent comes later in the list is held back until the parent is
    /// in place, so siblings keep their list order. Fails with `OrphanNode`
    /// when a parent is missing from the list and with `InvalidState` when
    /// parent links form a cycle.
    pub fn build(records: &[Category]) -> AppResult<Self> {
        let listed: HashSet<i64> = records.iter().map(|r| r.pk).collect();
        let mut waiting: HashMap<i64, Vec<&Category>> = HashMap::new();
        let mut tree = Self::new();

        for record in records {
            match record.parent {
                Some(parent) if !tree.contains(parent) => {
                    if !listed.contains(&parent) {
                        return Err(AppError::OrphanNode {
                            id: record.pk,
                            parent,
                        });
                    }
                    waiting.entry(parent).or_default().push(record);
                }
                _ => {
                    let mut ready = vec![record];
                    while let Some(next) = ready.pop() {
                        tree.insert(next)?;
                        if let Some(children) = waiting.remove(&next.pk) {
                            ready.extend(children.into_iter().rev());
                        }
                    }
                }
            }
        }

        if let Some(stuck) = waiting.values().flatten().map(|r| r.pk).min() {
            return Err(AppError::InvalidState(format!(
                "category {} is part of a parent cycle",
                stuck
            )));
        }
        trace!(nodes = tree.len(), roots = tree.roots.len(), "Built category tree");
        Ok(tree)
    }

    pub fn insert(&mut self, record: &Category) -> AppResult<()> {
        self.set(record.pk, &record.name, record.parent)
    }

    /// Adds node `id`, or renames and moves it (with its subtree) if it is
    /// already present. Fails without touching the tree when `parent` is
    /// unknown or lies inside the node's own subtree.
    pub fn set(&mut self, id: i64, name: &str, parent: Option<i64>) -> AppResult<()> {
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(&parent_id) {
                return Err(AppError::OrphanNode {
                    id,
                    parent: parent_id,
                });
            }
            if self.nodes.contains_key(&id) && self.is_within(parent_id, id) {
                return Err(AppError::InvalidState(format!(
                    "cannot move category {} under its own subtree (node {})",
                    id, parent_id
                )));
            }
        }

        let previous = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.name = name.to_string();
                let previous = node.parent;
                node.parent = parent;
                Some(previous)
            }
            None => {
                self.nodes.insert(
                    id,
                    TreeNode {
                        id,
                        name: name.to_string(),
                        parent,
                        children: Vec::new(),
                    },
                );
                None
            }
        };

        match previous {
            Some(old_parent) if old_parent == parent => {}
            Some(old_parent) => {
                self.detach(id, old_parent);
                self.attach(id, parent);
            }
            None => self.attach(id, parent),
        }
        Ok(())
    }

    pub fn find(&self, id: i64) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    /// Parent of `id`; `None` for top-level and unknown nodes alike.
    pub fn find_parent(&self, id: i64) -> Option<i64> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Removes `id` together with its subtree and returns the removed ids in
    /// depth-first pre-order. Unknown ids remove nothing.
    pub fn delete(&mut self, id: i64) -> Vec<i64> {
        let Some(parent) = self.nodes.get(&id).map(|node| node.parent) else {
            return Vec::new();
        };
        let removed = self.subtree(id);
        self.detach(id, parent);
        for node_id in &removed {
            self.nodes.remove(node_id);
        }
        removed
    }

    /// Ids of `id` and all its descendants in depth-first pre-order.
    pub fn subtree(&self, id: i64) -> Vec<i64> {
        if !self.nodes.contains_key(&id) {
            return Vec::new();
        }
        self.walk(&[id]).map(|(_, node)| node.id).collect()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[i64] {
        &self.roots
    }

    pub fn children(&self, id: i64) -> &[i64] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node with its depth (roots at 0), depth-first pre-order.
    pub fn iter(&self) -> Iter<'_> {
        self.walk(&self.roots)
    }

    /// Names from the top-level ancestor down to `id`.
    pub fn path(&self, id: i64) -> Option<Vec<&str>> {
        let mut names = Vec::new();
        let mut current = self.nodes.get(&id);
        while let Some(node) = current {
            names.push(node.name.as_str());
            current = node.parent.and_then(|p| self.nodes.get(&p));
        }
        if names.is_empty() {
            return None;
        }
        names.reverse();
        Some(names)
    }

    /// Nested mapping `{"<id>": {"name": ..., "<child id>": {...}}}`.
    pub fn to_nested_json(&self) -> Value {
        let mut top = Map::new();
        for id in &self.roots {
            top.insert(id.to_string(), self.node_json(*id));
        }
        Value::Object(top)
    }

    fn node_json(&self, id: i64) -> Value {
        let mut obj = Map::new();
        if let Some(node) = self.nodes.get(&id) {
            obj.insert("name".into(), Value::String(node.name.clone()));
            for child in &node.children {
                obj.insert(child.to_string(), self.node_json(*child));
            }
        }
        Value::Object(obj)
    }

    fn walk(&self, start: &[i64]) -> Iter<'_> {
        Iter {
            tree: self,
            stack: start.iter().rev().map(|id| (*id, 0)).collect(),
        }
    }

    /// Whether `candidate` is `ancestor` or one of its descendants.
    fn is_within(&self, candidate: i64, ancestor: i64) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.find_parent(id);
        }
        false
    }

    fn attach(&mut self, id: i64, parent: Option<i64>) {
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(node) => node.children.push(id),
            None => self.roots.push(id),
        }
    }

    fn detach(&mut self, id: i64, parent: Option<i64>) {
        let siblings = match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        };
        siblings.retain(|child| *child != id);
    }
}

/// Depth-first pre-order traversal yielding `(depth, node)`.
pub struct Iter<'a> {
    tree: &'a CategoryTree,
    stack: Vec<(i64, usize)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (usize, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            if let Some(node) = self.tree.nodes.get(&id) {
                self.stack
                    .extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
                return Some((depth, node));
            }
        }
        None
    }
}
