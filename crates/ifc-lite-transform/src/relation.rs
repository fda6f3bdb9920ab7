// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative relationship descriptors

use crate::{Result, TransformError};
use ifc_lite_model::{EntityId, Navigator, SchemaRegistry};
use serde::{Deserialize, Serialize};

/// A typed parent/children relationship edge
///
/// The host property lives on the child side and exposes the relationship
/// instances (usually an inverse such as `Decomposes`). Parent and child
/// properties are forward attributes of the relationship type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationInfo {
    name: String,
    relation_type: String,
    host_property: String,
    parent_property: String,
    child_property: String,
    parent_index: usize,
    child_index: usize,
}

impl RelationInfo {
    /// Describe a relation, checking every name against the schema
    pub fn new(
        schema: &SchemaRegistry,
        name: &str,
        relation_type: &str,
        host_property: &str,
        parent_property: &str,
        child_property: &str,
    ) -> Result<Self> {
        let rel = schema.entity(relation_type).map_err(|_| {
            TransformError::config(format!("{}: unknown relation type {}", name, relation_type))
        })?;

        let forward = |property: &str| {
            rel.property(property)
                .filter(|p| p.is_reference() && !p.is_inverse())
                .map(|p| p.index)
                .ok_or_else(|| {
                    TransformError::config(format!(
                        "{}: {} has no entity attribute '{}'",
                        name,
                        rel.name(),
                        property
                    ))
                })
        };
        let parent_index = forward(parent_property)?;
        let child_index = forward(child_property)?;

        // Some type must expose the relationship through the host property
        let hosted = schema.type_names().into_iter().any(|type_name| {
            schema
                .property(type_name, host_property)
                .ok()
                .map(|p| match &p.inverse {
                    Some(inv) => {
                        schema.is_subtype_of(rel.name(), &inv.source_type)
                            || schema.is_subtype_of(&inv.source_type, rel.name())
                    }
                    None => p.is_reference(),
                })
                .unwrap_or(false)
        });
        if !hosted {
            return Err(TransformError::config(format!(
                "{}: no entity type exposes {} through '{}'",
                name,
                rel.name(),
                host_property
            )));
        }

        Ok(Self {
            name: name.to_string(),
            relation_type: rel.name().to_string(),
            host_property: host_property.to_string(),
            parent_property: parent_property.to_string(),
            child_property: child_property.to_string(),
            parent_index,
            child_index,
        })
    }

    /// Aggregation (IfcRelAggregates)
    pub fn decomposition(schema: &SchemaRegistry) -> Result<Self> {
        Self::new(
            schema,
            "Decomposition",
            "IFCRELAGGREGATES",
            "Decomposes",
            "RelatingObject",
            "RelatedObjects",
        )
    }

    /// Nesting (IfcRelNests)
    pub fn nesting(schema: &SchemaRegistry) -> Result<Self> {
        Self::new(
            schema,
            "Nesting",
            "IFCRELNESTS",
            "Nests",
            "RelatingObject",
            "RelatedObjects",
        )
    }

    /// Spatial containment (IfcRelContainedInSpatialStructure)
    pub fn spatial_containment(schema: &SchemaRegistry) -> Result<Self> {
        Self::new(
            schema,
            "SpatialContainment",
            "IFCRELCONTAINEDINSPATIALSTRUCTURE",
            "ContainedInStructure",
            "RelatingStructure",
            "RelatedElements",
        )
    }

    /// Property assignment (IfcRelDefinesByProperties)
    pub fn defines_by_properties(schema: &SchemaRegistry) -> Result<Self> {
        Self::new(
            schema,
            "DefinesByProperties",
            "IFCRELDEFINESBYPROPERTIES",
            "IsDefinedBy",
            "RelatingPropertyDefinition",
            "RelatedObjects",
        )
    }

    /// Type assignment (IfcRelDefinesByType)
    pub fn defines_by_type(schema: &SchemaRegistry) -> Result<Self> {
        Self::new(
            schema,
            "DefinesByType",
            "IFCRELDEFINESBYTYPE",
            "IsTypedBy",
            "RelatingType",
            "RelatedObjects",
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relation_type(&self) -> &str {
        &self.relation_type
    }

    pub fn host_property(&self) -> &str {
        &self.host_property
    }

    pub fn parent_property(&self) -> &str {
        &self.parent_property
    }

    pub fn child_property(&self) -> &str {
        &self.child_property
    }

    /// Attribute position of the parent role on the relationship type
    pub fn parent_index(&self) -> usize {
        self.parent_index
    }

    pub fn child_index(&self) -> usize {
        self.child_index
    }

    /// Relationship instances exposed by the entity's host property
    pub fn relationships_of(&self, nav: &Navigator<'_>, id: EntityId) -> Result<Vec<EntityId>> {
        let entity = nav.entity(id)?;
        let schema = nav.schema_of(&entity)?;
        let Some(host) = schema.property(&self.host_property) else {
            return Ok(Vec::new());
        };
        Ok(nav
            .related(&entity, host)
            .into_iter()
            .filter(|rel| nav.is_a(*rel, &self.relation_type))
            .collect())
    }

    /// Parent-role entities of the relationships the entity is hosted in
    pub fn parents_of(&self, nav: &Navigator<'_>, id: EntityId) -> Result<Vec<EntityId>> {
        let mut parents = Vec::new();
        for rel in self.relationships_of(nav, id)? {
            let rel = nav.entity(rel)?;
            for parent in rel
                .get(self.parent_index)
                .map(|v| v.entity_refs())
                .unwrap_or_default()
            {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        Ok(parents)
    }

    /// Child-role entities of relationships in which the entity is the parent
    pub fn children_of(&self, nav: &Navigator<'_>, id: EntityId) -> Result<Vec<EntityId>> {
        let schema = nav.model().schema();
        let mut children = Vec::new();
        let referrers = nav.inverses().referrers(id);
        for referrer in referrers {
            if referrer.attribute != self.parent_index
                || !schema.is_subtype_of(referrer.ifc_type.name(), &self.relation_type)
            {
                continue;
            }
            let rel = nav.entity(referrer.entity)?;
            for child in rel
                .get(self.child_index)
                .map(|v| v.entity_refs())
                .unwrap_or_default()
            {
                if !children.contains(&child) {
                    children.push(child);
                }
            }
        }
        Ok(children)
    }
}

/// Predefined relation kinds, usable from serialized preferences
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    #[default]
    Decomposition,
    Nesting,
    SpatialContainment,
    DefinesByProperties,
    DefinesByType,
}

impl RelationKind {
    pub fn info(self, schema: &SchemaRegistry) -> Result<RelationInfo> {
        match self {
            RelationKind::Decomposition => RelationInfo::decomposition(schema),
            RelationKind::Nesting => RelationInfo::nesting(schema),
            RelationKind::SpatialContainment => RelationInfo::spatial_containment(schema),
            RelationKind::DefinesByProperties => RelationInfo::defines_by_properties(schema),
            RelationKind::DefinesByType => RelationInfo::defines_by_type(schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use ifc_lite_model::{IfcModel, InverseIndex};

    #[test]
    fn test_predefined_relations_validate() {
        let schema = SchemaRegistry::ifc4();
        for kind in [
            RelationKind::Decomposition,
            RelationKind::Nesting,
            RelationKind::SpatialContainment,
            RelationKind::DefinesByProperties,
            RelationKind::DefinesByType,
        ] {
            assert!(kind.info(&schema).is_ok(), "{:?}", kind);
        }
    }

    #[test]
    fn test_bad_names_are_config_errors() {
        let schema = SchemaRegistry::ifc4();
        let attempts = [
            ("IFCRELNOPE", "Decomposes", "RelatingObject", "RelatedObjects"),
            ("IFCRELAGGREGATES", "Decomposes", "Relating", "RelatedObjects"),
            ("IFCRELAGGREGATES", "Decomposes", "RelatingObject", "Name"),
            ("IFCRELAGGREGATES", "Hosting", "RelatingObject", "RelatedObjects"),
        ];
        for (rel, host, parent, child) in attempts {
            let info = RelationInfo::new(&schema, "x", rel, host, parent, child);
            assert!(
                matches!(info, Err(TransformError::Config(_))),
                "{rel}.{host}"
            );
        }
    }

    #[test]
    fn test_parents_and_children() {
        let (model, ids) = fixtures::building_model();
        let index = InverseIndex::build(&model);
        let nav = Navigator::new(&model, &index);
        let rel = RelationInfo::decomposition(model.schema()).unwrap();

        assert_eq!(
            rel.parents_of(&nav, ids.storey_1).unwrap(),
            vec![ids.building]
        );
        assert!(rel.relationships_of(&nav, ids.project).unwrap().is_empty());
        assert_eq!(
            rel.children_of(&nav, ids.building).unwrap(),
            vec![ids.storey_1, ids.storey_2]
        );

        let containment = RelationInfo::spatial_containment(model.schema()).unwrap();
        assert_eq!(
            containment.parents_of(&nav, ids.wall_1).unwrap(),
            vec![ids.storey_1]
        );
    }
}
