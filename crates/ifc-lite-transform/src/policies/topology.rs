// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Depth-bounded copy along one relation

use crate::{
    HierarchyIndex, ModelTransform, PassDecision, PhaseOutcome, ProgressToken, RelationKind,
    Result, TransformConfig, TransformPackage,
};
use ifc_lite_model::{DecodedEntity, EntityId, IfcModel};
use ifc_lite_store::ModelHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyAggregationPreferences {
    pub relation: RelationKind,
    /// Deepest level kept; roots are at level 0
    pub max_depth: usize,
}

impl Default for TopologyAggregationPreferences {
    fn default() -> Self {
        Self {
            relation: RelationKind::Decomposition,
            max_depth: 2,
        }
    }
}

impl TopologyAggregationPreferences {
    pub fn new(relation: RelationKind, max_depth: usize) -> Self {
        Self {
            relation,
            max_depth,
        }
    }
}

#[derive(Debug, Default)]
pub struct TopologyState {
    index: Option<HierarchyIndex>,
    relation: String,
}

impl TopologyState {
    pub fn index(&self) -> Option<&HierarchyIndex> {
        self.index.as_ref()
    }

    pub fn level_of(&self, id: EntityId) -> Option<usize> {
        self.index.as_ref()?.level_of(&self.relation, id)
    }
}

/// Drops everything below a level of a relation hierarchy
pub struct TopologyAggregationTransform {
    config: TransformConfig,
    preferences: TopologyAggregationPreferences,
}

impl TopologyAggregationTransform {
    pub fn new(preferences: TopologyAggregationPreferences) -> Self {
        Self {
            config: TransformConfig::default(),
            preferences,
        }
    }

    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn preferences(&self) -> &TopologyAggregationPreferences {
        &self.preferences
    }

    fn survives(&self, state: &TopologyState, id: EntityId) -> bool {
        state
            .level_of(id)
            .map(|level| level <= self.preferences.max_depth)
            .unwrap_or(true)
    }
}

impl ModelTransform for TopologyAggregationTransform {
    type State = TopologyState;

    fn name(&self) -> &str {
        "TopologyAggregation"
    }

    fn config(&self) -> &TransformConfig {
        &self.config
    }

    fn create_transform_package(
        &self,
        source: Arc<dyn IfcModel>,
        target: ModelHandle,
        progress: ProgressToken,
    ) -> Result<TransformPackage<TopologyState>> {
        Ok(TransformPackage::new(
            source,
            target,
            progress,
            self.config.log_filter,
            TopologyState::default(),
        ))
    }

    fn do_preprocess_transform(
        &self,
        package: &mut TransformPackage<TopologyState>,
    ) -> Result<PhaseOutcome> {
        let schema = package.source_model().schema();
        let relation = self.preferences.relation.info(schema)?;
        let name = relation.name().to_string();
        let mut index = HierarchyIndex::new(vec![relation]);
        {
            let nav = package.navigator();
            for id in package.source_model().resolver().all_ids() {
                index.observe(&nav, id)?;
            }
        }

        if index.is_empty() {
            return Ok(PhaseOutcome::NotSupported(format!("model has no {} hierarchy", name)));
        }
        log::debug!(
            "{} hierarchy: {} entities, {} levels",
            name,
            index.len(),
            index.max_level(&name).map(|l| l + 1).unwrap_or(0)
        );

        let state = package.state_mut();
        state.index = Some(index);
        state.relation = name;
        Ok(PhaseOutcome::Proceed)
    }

    fn pass_instance(
        &self,
        entity: &DecodedEntity,
        package: &mut TransformPackage<TopologyState>,
    ) -> Result<PassDecision> {
        let state = package.state();
        let Some(relation) = state.index().and_then(|i| i.relations().first()) else {
            return Ok(PassDecision::Copy);
        };
        if !self.survives(state, entity.id) {
            return Ok(PassDecision::Drop);
        }

        let is_relationship = package
            .source_model()
            .schema()
            .is_subtype_of(entity.ifc_type.name(), relation.relation_type());
        if is_relationship {
            let refs = |index: usize| {
                entity
                    .get(index)
                    .map(|v| v.entity_refs())
                    .unwrap_or_default()
            };
            let parent_kept = refs(relation.parent_index())
                .iter()
                .all(|p| self.survives(state, *p));
            let child_kept = refs(relation.child_index())
                .iter()
                .any(|c| self.survives(state, *c));
            if !parent_kept || !child_kept {
                return Ok(PassDecision::Drop);
            }
        }
        Ok(PassDecision::Copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::{ModelTransformExt, TransformAction, TransformCode, TransformResult};
    use ifc_lite_model::{EntityResolver, IfcType};
    use ifc_lite_store::MemoryModel;

    async fn run(source: MemoryModel, prefs: TopologyAggregationPreferences) -> TransformResult {
        let source: Arc<dyn IfcModel> = Arc::new(source);
        TopologyAggregationTransform::new(prefs)
            .run(source, ProgressToken::new())
            .unwrap()
            .await
    }

    #[tokio::test]
    async fn test_storeys_below_depth_are_dropped() {
        let (source, _) = fixtures::building_model();
        let result = run(
            source,
            TopologyAggregationPreferences::new(RelationKind::Decomposition, 1),
        )
        .await;
        assert!(result.is_finished(), "{:?}", result.cause);
        // two storeys and the aggregation holding them
        assert_eq!(result.count(TransformAction::Skipped), 3);

        let target = result.into_model().unwrap();
        assert_eq!(target.count_by_type(&IfcType::IfcProject), 1);
        assert_eq!(target.count_by_type(&IfcType::IfcBuilding), 1);
        assert_eq!(target.count_by_type(&IfcType::IfcBuildingStorey), 0);
        assert_eq!(target.count_by_type(&IfcType::IfcRelAggregates), 1);
        // elements are not part of the decomposition tree
        assert_eq!(target.count_by_type(&IfcType::IfcWall), 2);
        assert!(target.validate().is_ok());
    }

    #[tokio::test]
    async fn test_depth_zero_keeps_roots_only() {
        let (source, _) = fixtures::building_model();
        let result = run(
            source,
            TopologyAggregationPreferences::new(RelationKind::Decomposition, 0),
        )
        .await;
        assert!(result.is_finished());
        assert_eq!(result.count(TransformAction::Skipped), 5);
        let target = result.into_model().unwrap();
        assert_eq!(target.count_by_type(&IfcType::IfcProject), 1);
        assert_eq!(target.count_by_type(&IfcType::IfcRelAggregates), 0);
    }

    #[tokio::test]
    async fn test_containment_drops_contained_elements() {
        let (source, _) = fixtures::building_model();
        let result = run(
            source,
            TopologyAggregationPreferences::new(RelationKind::SpatialContainment, 0),
        )
        .await;
        assert!(result.is_finished());
        // two walls, the slab and both containment relationships
        assert_eq!(result.count(TransformAction::Skipped), 5);
        let target = result.into_model().unwrap();
        assert_eq!(target.count_by_type(&IfcType::IfcBuildingStorey), 2);
        assert_eq!(target.count_by_type(&IfcType::IfcWall), 0);
        assert_eq!(target.count_by_type(&IfcType::IfcSlab), 0);
    }

    #[tokio::test]
    async fn test_flat_model_is_not_supported() {
        let result = run(
            fixtures::pset_model(),
            TopologyAggregationPreferences::default(),
        )
        .await;
        assert_eq!(result.code, TransformCode::NotSupported);
        let message = result.message.clone().unwrap_or_default();
        assert!(message.contains("Decomposition"), "{}", message);
        assert!(result.target.read().is_empty());
    }

    #[test]
    fn test_preferences_from_json() {
        let prefs: TopologyAggregationPreferences =
            serde_json::from_str(r#"{ "relation": "SpatialContainment" }"#).unwrap();
        assert_eq!(prefs.relation, RelationKind::SpatialContainment);
        assert_eq!(prefs.max_depth, 2);
    }
}
