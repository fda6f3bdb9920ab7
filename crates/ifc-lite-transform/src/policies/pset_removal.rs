// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property set removal by name

use super::ids_of_kind;
use crate::{
    ModelTransform, PassDecision, PhaseOutcome, ProgressToken, Result, TransformConfig,
    TransformPackage,
};
use ifc_lite_model::{DecodedEntity, EntityId, IfcModel};
use ifc_lite_store::ModelHandle;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which list wins when a name is on both
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterRuleStrategy {
    #[default]
    ExcludeBeforeInclude,
    IncludeBeforeExclude,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertySetRemovalPreferences {
    /// Names of property sets to remove
    pub exclude: Vec<String>,
    /// Names of property sets to keep; empty keeps everything not excluded
    pub include: Vec<String>,
    pub case_sensitive: bool,
    pub strategy: FilterRuleStrategy,
}

impl PropertySetRemovalPreferences {
    pub fn excluding<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            exclude: names.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    pub fn with_include<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.include = names.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_strategy(mut self, strategy: FilterRuleStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn listed(&self, list: &[String], name: &str) -> bool {
        list.iter().any(|n| {
            if self.case_sensitive {
                n == name
            } else {
                n.eq_ignore_ascii_case(name)
            }
        })
    }

    /// Whether a property set of this name survives
    pub fn keeps(&self, name: &str) -> bool {
        let excluded = self.listed(&self.exclude, name);
        let included = self.listed(&self.include, name);
        match self.strategy {
            FilterRuleStrategy::ExcludeBeforeInclude => {
                !excluded && (included || self.include.is_empty())
            }
            FilterRuleStrategy::IncludeBeforeExclude => {
                included || (!excluded && self.include.is_empty())
            }
        }
    }
}

/// Labels removed by the run
#[derive(Debug, Default)]
pub struct PropertySetRemovalState {
    dropped: FxHashSet<EntityId>,
}

impl PropertySetRemovalState {
    pub fn is_dropped(&self, id: EntityId) -> bool {
        self.dropped.contains(&id)
    }
}

/// Removes property sets, the assignments left empty and the properties they owned
pub struct PropertySetRemovalTransform {
    config: TransformConfig,
    preferences: PropertySetRemovalPreferences,
}

impl PropertySetRemovalTransform {
    pub fn new(preferences: PropertySetRemovalPreferences) -> Self {
        Self {
            config: TransformConfig::default(),
            preferences,
        }
    }

    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn preferences(&self) -> &PropertySetRemovalPreferences {
        &self.preferences
    }
}

impl ModelTransform for PropertySetRemovalTransform {
    type State = PropertySetRemovalState;

    fn name(&self) -> &str {
        "PropertySetRemoval"
    }

    fn config(&self) -> &TransformConfig {
        &self.config
    }

    fn create_transform_package(
        &self,
        source: Arc<dyn IfcModel>,
        target: ModelHandle,
        progress: ProgressToken,
    ) -> Result<TransformPackage<PropertySetRemovalState>> {
        Ok(TransformPackage::new(
            source,
            target,
            progress,
            self.config.log_filter,
            PropertySetRemovalState::default(),
        ))
    }

    fn do_preprocess_transform(
        &self,
        package: &mut TransformPackage<PropertySetRemovalState>,
    ) -> Result<PhaseOutcome> {
        let model = package.source_model();
        let schema = model.schema();
        let resolver = model.resolver();
        let name = schema.property("IfcPropertySetDefinition", "Name")?.index;
        let relating = schema
            .property("IfcRelDefinesByProperties", "RelatingPropertyDefinition")?
            .index;
        let mut dropped = FxHashSet::default();

        let psets: Vec<_> = ids_of_kind(model, "IFCPROPERTYSETDEFINITION")
            .into_iter()
            .filter_map(|id| resolver.get(id))
            .filter(|pset| !self.preferences.keeps(pset.get_string(name).unwrap_or("")))
            .collect();
        dropped.extend(psets.iter().map(|pset| pset.id));

        for id in ids_of_kind(model, "IFCRELDEFINESBYPROPERTIES") {
            let definitions = resolver
                .get(id)
                .and_then(|rel| rel.get(relating).map(|v| v.entity_refs()))
                .unwrap_or_default();
            if !definitions.is_empty() && definitions.iter().all(|d| dropped.contains(d)) {
                dropped.insert(id);
            }
        }

        let inverses = package.inverses();
        for pset in &psets {
            for member in pset.attributes.iter().flat_map(|v| v.entity_refs()) {
                let owned = resolver
                    .get(member)
                    .map(|e| {
                        schema.is_subtype_of(e.ifc_type.name(), "IFCPROPERTY")
                            || schema.is_subtype_of(e.ifc_type.name(), "IFCPHYSICALQUANTITY")
                    })
                    .unwrap_or(false);
                let exclusive = inverses
                    .referrers(member)
                    .iter()
                    .all(|r| dropped.contains(&r.entity));
                if owned && exclusive {
                    dropped.insert(member);
                }
            }
        }

        log::debug!("property set removal drops {} entities", dropped.len());
        package.state_mut().dropped = dropped;
        Ok(PhaseOutcome::Proceed)
    }

    fn pass_instance(
        &self,
        entity: &DecodedEntity,
        package: &mut TransformPackage<PropertySetRemovalState>,
    ) -> Result<PassDecision> {
        Ok(if package.state().is_dropped(entity.id) {
            PassDecision::Drop
        } else {
            PassDecision::Copy
        })
    }
}
