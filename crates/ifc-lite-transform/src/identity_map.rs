// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Source to target identity mapping for one run

use crate::{Result, TransformError};
use ifc_lite_model::EntityId;
use rustc_hash::FxHashMap;

/// Bidirectional, injective map from source labels to target labels
///
/// Entries are never replaced: registering the same pair again is a no-op,
/// registering a conflicting pair fails.
#[derive(Debug, Default)]
pub struct IdentityMap {
    forward: FxHashMap<EntityId, EntityId>,
    backward: FxHashMap<EntityId, EntityId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target of a source entity
    pub fn resolve(&self, source: EntityId) -> Option<EntityId> {
        self.forward.get(&source).copied()
    }

    /// Source a target entity was copied from
    pub fn source_of(&self, target: EntityId) -> Option<EntityId> {
        self.backward.get(&target).copied()
    }

    pub fn contains(&self, source: EntityId) -> bool {
        self.forward.contains_key(&source)
    }

    pub fn register(&mut self, source: EntityId, target: EntityId) -> Result<()> {
        if let Some(existing) = self.forward.get(&source) {
            if *existing == target {
                return Ok(());
            }
            return Err(TransformError::IdentityConflict {
                source_id: source,
                existing: *existing,
                attempted: target,
            });
        }
        if let Some(owner) = self.backward.get(&target) {
            return Err(TransformError::IdentityConflict {
                source_id: *owner,
                existing: target,
                attempted: target,
            });
        }
        self.forward.insert(source, target);
        self.backward.insert(target, source);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// (source, target) pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.forward.iter().map(|(s, t)| (*s, *t))
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.backward.clear();
    }
}
