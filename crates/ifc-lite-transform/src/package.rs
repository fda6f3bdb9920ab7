// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-run execution context

use crate::{IdentityMap, LogEntry, LogFilter, PassDecision, ProgressToken, Result, TransformAction};
use ifc_lite_model::{
    DecodedEntity, EntityId, EntityResolverExt, IfcModel, InstanceHandle, InverseIndex, ModelId,
    Navigator,
};
use ifc_lite_store::{MemoryModel, ModelHandle};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Everything one run works with
///
/// Owns the identity map, the action log and the memoized pass decisions.
/// The source and target stores are only referenced; [`TransformPackage::dispose`]
/// clears the run state and leaves both stores untouched. `S` carries
/// policy-specific state.
pub struct TransformPackage<S> {
    source: Arc<dyn IfcModel>,
    target: ModelHandle,
    target_id: ModelId,
    identity: IdentityMap,
    log: Vec<LogEntry>,
    log_filter: LogFilter,
    progress: ProgressToken,
    inverses: InverseIndex,
    decisions: FxHashMap<EntityId, PassDecision>,
    state: S,
}

impl<S> TransformPackage<S> {
    /// Create the context and index the source's back-references
    pub fn new(
        source: Arc<dyn IfcModel>,
        target: ModelHandle,
        progress: ProgressToken,
        log_filter: LogFilter,
        state: S,
    ) -> Self {
        let inverses = InverseIndex::build(source.as_ref());
        let target_id = target.read().id();
        Self {
            source,
            target,
            target_id,
            identity: IdentityMap::new(),
            log: Vec::new(),
            log_filter,
            progress,
            inverses,
            decisions: FxHashMap::default(),
            state,
        }
    }

    pub fn source(&self) -> &Arc<dyn IfcModel> {
        &self.source
    }

    pub fn source_model(&self) -> &dyn IfcModel {
        self.source.as_ref()
    }

    /// Source entity by label
    pub fn source_entity(&self, id: EntityId) -> Result<Arc<DecodedEntity>> {
        Ok(self.source.resolver().get_or_err(id)?)
    }

    /// Forward and inverse navigation over the source
    pub fn navigator(&self) -> Navigator<'_> {
        Navigator::new(self.source.as_ref(), &self.inverses)
    }

    pub fn inverses(&self) -> &InverseIndex {
        &self.inverses
    }

    pub fn target(&self) -> &ModelHandle {
        &self.target
    }

    pub fn target_id(&self) -> ModelId {
        self.target_id
    }

    /// Short read access to the target store
    pub fn target_read(&self) -> RwLockReadGuard<'_, MemoryModel> {
        self.target.read()
    }

    /// Short write access to the target store
    ///
    /// Do not keep the guard across policy callbacks.
    pub fn target_mut(&self) -> RwLockWriteGuard<'_, MemoryModel> {
        self.target.write()
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.identity
    }

    pub fn identity_map_mut(&mut self) -> &mut IdentityMap {
        &mut self.identity
    }

    pub fn progress(&self) -> &ProgressToken {
        &self.progress
    }

    pub fn is_canceled_or_broken(&self) -> bool {
        self.progress.is_canceled_or_broken()
    }

    pub fn log_filter(&self) -> LogFilter {
        self.log_filter
    }

    /// Record an action if the filter admits it
    pub fn log_action(&mut self, entity: InstanceHandle, action: TransformAction) -> bool {
        if !self.log_filter.contains(action) {
            return false;
        }
        self.log.push(LogEntry { entity, action });
        true
    }

    /// Record an action on a source entity
    pub fn log_source(&mut self, id: EntityId, action: TransformAction) -> bool {
        let handle = InstanceHandle::new(self.source.model_id(), id);
        self.log_action(handle, action)
    }

    /// Record an action on a target entity
    pub fn log_target(&mut self, id: EntityId, action: TransformAction) -> bool {
        let handle = InstanceHandle::new(self.target_id, id);
        self.log_action(handle, action)
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn take_log(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.log)
    }

    /// Memoized pass decision of a source entity
    pub fn decision(&self, id: EntityId) -> Option<PassDecision> {
        self.decisions.get(&id).copied()
    }

    pub(crate) fn remember_decision(&mut self, id: EntityId, decision: PassDecision) {
        self.decisions.insert(id, decision);
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Clear run state; the stores are left as they are
    pub fn dispose(&mut self) {
        self.identity.clear();
        self.log.clear();
        self.decisions.clear();
    }
}
