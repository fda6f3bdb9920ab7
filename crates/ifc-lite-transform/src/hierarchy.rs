// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental depth index over tracked relations
//!
//! Entities are observed one at a time in any order. Each observation links
//! the entity below its single parent; a parent seen for the first time is
//! registered as a root. Levels of already indexed descendants are corrected
//! breadth-first whenever a subtree gets attached below another node.

use crate::{RelationInfo, Result, TransformError};
use ifc_lite_model::{EntityId, Navigator};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Position of an entity within one tracked relation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeAtLevel {
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub level: usize,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: FxHashMap<EntityId, NodeAtLevel>,
}

impl Tree {
    fn level(&self, id: EntityId) -> Option<usize> {
        self.nodes.get(&id).map(|n| n.level)
    }

    /// Whether `ancestor` is `id` or above it
    fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut seen = FxHashSet::default();
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            if !seen.insert(node) {
                return false;
            }
            current = self.nodes.get(&node).and_then(|n| n.parent);
        }
        false
    }

    fn attach(&mut self, child: EntityId, parent: EntityId) {
        let parent_node = self.nodes.entry(parent).or_default();
        let parent_level = parent_node.level;
        if !parent_node.children.contains(&child) {
            parent_node.children.push(child);
        }

        let node = self.nodes.entry(child).or_default();
        node.parent = Some(parent);
        node.level = parent_level + 1;

        let mut queue = VecDeque::from([child]);
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let level = node.level + 1;
            for kid in node.children.clone() {
                if let Some(kid_node) = self.nodes.get_mut(&kid) {
                    kid_node.level = level;
                    queue.push_back(kid);
                }
            }
        }
    }
}

/// Depth index over one or more relations
#[derive(Debug)]
pub struct HierarchyIndex {
    relations: Vec<RelationInfo>,
    trees: Vec<Tree>,
}

impl HierarchyIndex {
    pub fn new(relations: Vec<RelationInfo>) -> Self {
        let trees = relations.iter().map(|_| Tree::default()).collect();
        Self { relations, trees }
    }

    pub fn relations(&self) -> &[RelationInfo] {
        &self.relations
    }

    /// Index an entity under its parent in every tracked relation
    ///
    /// Returns whether any relation matched. Parents are resolved for all
    /// relations before the index changes, so a violation leaves it as it was.
    pub fn observe(&mut self, nav: &Navigator<'_>, id: EntityId) -> Result<bool> {
        let mut links = Vec::new();
        for (slot, relation) in self.relations.iter().enumerate() {
            let parents = relation.parents_of(nav, id)?;
            match parents.as_slice() {
                [] => {}
                [parent] => {
                    let tree = &self.trees[slot];
                    if let Some(existing) = tree.nodes.get(&id).and_then(|n| n.parent) {
                        if existing != *parent {
                            return Err(TransformError::MultipleParents {
                                relation: relation.name().to_string(),
                                entity: id,
                                count: 2,
                            });
                        }
                    }
                    if tree.is_ancestor(id, *parent) {
                        return Err(TransformError::CyclicRelation {
                            relation: relation.name().to_string(),
                            entity: id,
                        });
                    }
                    links.push((slot, *parent));
                }
                _ => {
                    return Err(TransformError::MultipleParents {
                        relation: relation.name().to_string(),
                        entity: id,
                        count: parents.len(),
                    })
                }
            }
        }

        for (slot, parent) in &links {
            self.trees[*slot].attach(id, *parent);
        }
        Ok(!links.is_empty())
    }

    fn tree(&self, relation: &str) -> Option<&Tree> {
        self.relations
            .iter()
            .position(|r| r.name() == relation)
            .and_then(|slot| self.trees.get(slot))
    }

    pub fn node(&self, relation: &str, id: EntityId) -> Option<&NodeAtLevel> {
        self.tree(relation)?.nodes.get(&id)
    }

    pub fn level_of(&self, relation: &str, id: EntityId) -> Option<usize> {
        self.tree(relation)?.level(id)
    }

    pub fn parent_of(&self, relation: &str, id: EntityId) -> Option<EntityId> {
        self.node(relation, id)?.parent
    }

    pub fn children_of(&self, relation: &str, id: EntityId) -> &[EntityId] {
        self.node(relation, id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of indexed entities over all relations
    pub fn len(&self) -> usize {
        self.trees.iter().map(|t| t.nodes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_level(&self, relation: &str) -> Option<usize> {
        self.tree(relation)?.nodes.values().map(|n| n.level).max()
    }

    /// Walk a relation level by level, ordered by label within a level
    pub fn visit(&self, relation: &str, mut visitor: impl FnMut(EntityId, &NodeAtLevel)) {
        let Some(tree) = self.tree(relation) else {
            return;
        };
        let mut nodes: Vec<_> = tree.nodes.iter().collect();
        nodes.sort_by_key(|(id, node)| (node.level, **id));
        for (id, node) in nodes {
            visitor(*id, node);
        }
    }
}
