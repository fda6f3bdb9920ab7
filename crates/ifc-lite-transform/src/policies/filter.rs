// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Label and type based model filter

use super::ids_of_kind;
use crate::{
    ModelTransform, PassDecision, PhaseOutcome, ProgressToken, RelationInfo, Result,
    TransformConfig, TransformError, TransformPackage,
};
use ifc_lite_model::{DecodedEntity, EntityId, IfcModel, SchemaRegistry};
use ifc_lite_store::ModelHandle;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

/// Relationship kinds followed from accepted entities
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelFilterStrategy(u8);

impl ModelFilterStrategy {
    pub const NONE: Self = Self(0);
    /// IfcRelAggregates and IfcRelNests
    pub const WITH_DECOMPOSITION: Self = Self(1);
    /// IfcRelContainedInSpatialStructure
    pub const WITH_SPATIAL_CONTAINMENT: Self = Self(2);
    /// IfcRelDefinesByProperties
    pub const WITH_PROPERTIES: Self = Self(4);
    /// IfcRelDefinesByType
    pub const WITH_TYPES: Self = Self(8);
    /// All of the above plus any other IfcRelationship touching an accepted entity
    pub const ALL_RELATIONS: Self = Self(0b1_1111);

    const OTHER_RELATIONS: Self = Self(16);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn relations(self, schema: &SchemaRegistry) -> Result<Vec<RelationInfo>> {
        let mut relations = Vec::new();
        if self.contains(Self::WITH_DECOMPOSITION) {
            relations.push(RelationInfo::decomposition(schema)?);
            relations.push(RelationInfo::nesting(schema)?);
        }
        if self.contains(Self::WITH_SPATIAL_CONTAINMENT) {
            relations.push(RelationInfo::spatial_containment(schema)?);
        }
        if self.contains(Self::WITH_PROPERTIES) {
            relations.push(RelationInfo::defines_by_properties(schema)?);
        }
        if self.contains(Self::WITH_TYPES) {
            relations.push(RelationInfo::defines_by_type(schema)?);
        }
        Ok(relations)
    }
}

impl BitOr for ModelFilterStrategy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModelFilterStrategy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ModelFilterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::WITH_DECOMPOSITION, "WITH_DECOMPOSITION"),
            (Self::WITH_SPATIAL_CONTAINMENT, "WITH_SPATIAL_CONTAINMENT"),
            (Self::WITH_PROPERTIES, "WITH_PROPERTIES"),
            (Self::WITH_TYPES, "WITH_TYPES"),
            (Self::OTHER_RELATIONS, "OTHER_RELATIONS"),
        ];
        f.debug_set()
            .entries(
                names
                    .iter()
                    .filter(|(flag, _)| self.contains(*flag))
                    .map(|(_, name)| *name),
            )
            .finish()
    }
}

/// What the filter keeps
///
/// Label and type includes both have to hold for an entity to be selected;
/// an empty list does not restrict. Without any include criterion every
/// entity not excluded is kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFilterPreferences {
    pub include_labels: Vec<EntityId>,
    pub exclude_labels: Vec<EntityId>,
    pub include_types: Vec<String>,
    pub exclude_types: Vec<String>,
    pub strategy: ModelFilterStrategy,
}

impl ModelFilterPreferences {
    pub fn include_label(mut self, id: EntityId) -> Self {
        self.include_labels.push(id);
        self
    }

    pub fn exclude_label(mut self, id: EntityId) -> Self {
        self.exclude_labels.push(id);
        self
    }

    pub fn include_type(mut self, type_name: &str) -> Self {
        self.include_types.push(type_name.to_string());
        self
    }

    pub fn exclude_type(mut self, type_name: &str) -> Self {
        self.exclude_types.push(type_name.to_string());
        self
    }

    pub fn with_strategy(mut self, strategy: ModelFilterStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Entities accepted by the filter, fixed during preprocessing
#[derive(Debug, Default)]
pub struct FilterState {
    accepted: FxHashSet<EntityId>,
}

impl FilterState {
    pub fn is_accepted(&self, id: EntityId) -> bool {
        self.accepted.contains(&id)
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// Keeps selected entities, what they reference and optionally their relationships
pub struct ModelFilterTransform {
    config: TransformConfig,
    preferences: ModelFilterPreferences,
}

impl ModelFilterTransform {
    pub fn new(preferences: ModelFilterPreferences) -> Self {
        Self {
            config: TransformConfig::default(),
            preferences,
        }
    }

    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn preferences(&self) -> &ModelFilterPreferences {
        &self.preferences
    }

    fn check_types(&self, schema: &SchemaRegistry) -> Result<()> {
        let prefs = &self.preferences;
        for type_name in prefs.include_types.iter().chain(&prefs.exclude_types) {
            if !schema.contains(type_name) {
                return Err(TransformError::config(format!(
                    "model filter: unknown type {}",
                    type_name
                )));
            }
        }
        Ok(())
    }

    fn accept(&self, model: &dyn IfcModel) -> Result<FxHashSet<EntityId>> {
        let prefs = &self.preferences;
        let schema = model.schema();
        let resolver = model.resolver();
        let of_types = |entity: &DecodedEntity, types: &[String]| {
            types
                .iter()
                .any(|t| schema.is_subtype_of(entity.ifc_type.name(), t))
        };
        let excluded = |id: EntityId| {
            prefs.exclude_labels.contains(&id)
                || resolver
                    .get(id)
                    .map(|e| of_types(&*e, &prefs.exclude_types))
                    .unwrap_or(false)
        };

        let roots: Vec<EntityId> = resolver
            .all_ids()
            .into_iter()
            .filter(|id| {
                (prefs.include_labels.is_empty() || prefs.include_labels.contains(id))
                    && (prefs.include_types.is_empty()
                        || resolver
                            .get(*id)
                            .map(|e| of_types(&*e, &prefs.include_types))
                            .unwrap_or(false))
            })
            .collect();

        let mut accepted = FxHashSet::default();
        close_over(model, roots, &excluded, &mut accepted);

        let strategy = prefs.strategy;
        let relations = strategy.relations(schema)?;
        let candidates: Vec<(EntityId, &RelationInfo)> = relations
            .iter()
            .flat_map(|info| {
                ids_of_kind(model, info.relation_type())
                    .into_iter()
                    .map(move |id| (id, info))
            })
            .collect();
        let others: Vec<EntityId> = if strategy.contains(ModelFilterStrategy::OTHER_RELATIONS) {
            ids_of_kind(model, "IFCRELATIONSHIP")
                .into_iter()
                .filter(|id| !candidates.iter().any(|(c, _)| c == id))
                .collect()
        } else {
            Vec::new()
        };

        loop {
            let mut changed = false;
            for (rel_id, info) in &candidates {
                if accepted.contains(rel_id) || excluded(*rel_id) {
                    continue;
                }
                let Some(rel) = resolver.get(*rel_id) else {
                    continue;
                };
                let touches = rel
                    .get(info.child_index())
                    .map(|v| v.entity_refs())
                    .unwrap_or_default()
                    .iter()
                    .any(|child| accepted.contains(child));
                if !touches {
                    continue;
                }
                // the parent side comes along, other children do not
                accepted.insert(*rel_id);
                let seeds: Vec<EntityId> = rel
                    .attributes
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != info.child_index())
                    .flat_map(|(_, value)| value.entity_refs())
                    .collect();
                close_over(model, seeds, &excluded, &mut accepted);
                changed = true;
            }
            for rel_id in &others {
                if accepted.contains(rel_id) || excluded(*rel_id) {
                    continue;
                }
                let touches = resolver
                    .get(*rel_id)
                    .map(|rel| {
                        rel.attributes
                            .iter()
                            .flat_map(|v| v.entity_refs())
                            .any(|r| accepted.contains(&r))
                    })
                    .unwrap_or(false);
                if touches {
                    accepted.insert(*rel_id);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(accepted)
    }
}

/// Accept `seeds` and everything they reference, never crossing an excluded entity
fn close_over(
    model: &dyn IfcModel,
    seeds: Vec<EntityId>,
    excluded: &impl Fn(EntityId) -> bool,
    accepted: &mut FxHashSet<EntityId>,
) {
    let resolver = model.resolver();
    let mut stack = seeds;
    while let Some(id) = stack.pop() {
        if accepted.contains(&id) || excluded(id) {
            continue;
        }
        let Some(entity) = resolver.get(id) else {
            continue;
        };
        accepted.insert(id);
        stack.extend(entity.attributes.iter().flat_map(|v| v.entity_refs()));
    }
}

impl ModelTransform for ModelFilterTransform {
    type State = FilterState;

    fn name(&self) -> &str {
        "ModelFilter"
    }

    fn config(&self) -> &TransformConfig {
        &self.config
    }

    fn create_transform_package(
        &self,
        source: Arc<dyn IfcModel>,
        target: ModelHandle,
        progress: ProgressToken,
    ) -> Result<TransformPackage<FilterState>> {
        self.check_types(source.schema())?;
        Ok(TransformPackage::new(
            source,
            target,
            progress,
            self.config.log_filter,
            FilterState::default(),
        ))
    }

    fn do_preprocess_transform(
        &self,
        package: &mut TransformPackage<FilterState>,
    ) -> Result<PhaseOutcome> {
        let accepted = self.accept(package.source_model())?;
        log::debug!("model filter accepts {} entities", accepted.len());
        package.state_mut().accepted = accepted;
        Ok(PhaseOutcome::Proceed)
    }

    fn pass_instance(
        &self,
        entity: &DecodedEntity,
        package: &mut TransformPackage<FilterState>,
    ) -> Result<PassDecision> {
        Ok(if package.state().is_accepted(entity.id) {
            PassDecision::Copy
        } else {
            PassDecision::Drop
        })
    }
}
