// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forward and inverse property navigation
//!
//! Stores only hold forward references. [`InverseIndex`] scans them once and
//! [`Navigator`] answers any property of an entity, forward or inverse, by
//! descriptor or by name.

use crate::{
    AttributeValue, DecodedEntity, EntityId, EntityResolverExt, EntitySchema, IfcModel, IfcType,
    ModelError, PropertyDescriptor, Result, ValueKind,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Entity referencing another through one of its attributes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Referrer {
    pub entity: EntityId,
    pub ifc_type: IfcType,
    pub attribute: usize,
}

/// Reverse reference index over a whole model
#[derive(Debug, Default)]
pub struct InverseIndex {
    referrers: FxHashMap<EntityId, Vec<Referrer>>,
}

impl InverseIndex {
    /// Scan every forward reference of the model once
    pub fn build(model: &dyn IfcModel) -> Self {
        let resolver = model.resolver();
        let mut referrers: FxHashMap<EntityId, Vec<Referrer>> = FxHashMap::default();
        for id in resolver.all_ids() {
            let Some(entity) = resolver.get(id) else {
                continue;
            };
            for (attribute, value) in entity.attributes.iter().enumerate() {
                let mut targets = value.entity_refs();
                targets.sort_unstable();
                targets.dedup();
                for target in targets {
                    referrers.entry(target).or_default().push(Referrer {
                        entity: id,
                        ifc_type: entity.ifc_type.clone(),
                        attribute,
                    });
                }
            }
        }
        Self { referrers }
    }

    /// All referrers of an entity in declaration order
    pub fn referrers(&self, id: EntityId) -> &[Referrer] {
        self.referrers.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entities holding `id` through the forward side of an inverse property
    pub fn inverse_of(
        &self,
        model: &dyn IfcModel,
        id: EntityId,
        descriptor: &PropertyDescriptor,
    ) -> Vec<EntityId> {
        let Some(source) = &descriptor.inverse else {
            return Vec::new();
        };
        let schema = model.schema();
        self.referrers(id)
            .iter()
            .filter(|r| r.attribute == source.source_index)
            .filter(|r| schema.is_subtype_of(r.ifc_type.name(), &source.source_type))
            .map(|r| r.entity)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.referrers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.referrers.is_empty()
    }
}

/// Property resolution over a model and its inverse index
#[derive(Clone, Copy)]
pub struct Navigator<'a> {
    model: &'a dyn IfcModel,
    inverses: &'a InverseIndex,
}

impl<'a> Navigator<'a> {
    pub fn new(model: &'a dyn IfcModel, inverses: &'a InverseIndex) -> Self {
        Self { model, inverses }
    }

    pub fn model(&self) -> &'a dyn IfcModel {
        self.model
    }

    pub fn inverses(&self) -> &'a InverseIndex {
        self.inverses
    }

    pub fn entity(&self, id: EntityId) -> Result<Arc<DecodedEntity>> {
        self.model.resolver().get_or_err(id)
    }

    /// Flattened schema of an entity's type
    pub fn schema_of(&self, entity: &DecodedEntity) -> Result<&'a Arc<EntitySchema>> {
        self.model.schema().entity(entity.ifc_type.name())
    }

    /// Value of a property
    ///
    /// Inverse properties are assembled from the index: a single inverse with
    /// no referrer is `Null`, a set inverse is always a list.
    pub fn value(&self, entity: &DecodedEntity, descriptor: &PropertyDescriptor) -> AttributeValue {
        if !descriptor.is_inverse() {
            return entity
                .get(descriptor.index)
                .cloned()
                .unwrap_or(AttributeValue::Null);
        }
        let referrers = self.inverses.inverse_of(self.model, entity.id, descriptor);
        match descriptor.kind {
            ValueKind::EntityList => AttributeValue::refs(referrers),
            _ => referrers
                .first()
                .map(|id| AttributeValue::EntityRef(*id))
                .unwrap_or(AttributeValue::Null),
        }
    }

    /// Value of a property by name
    pub fn value_by_name(&self, id: EntityId, property: &str) -> Result<AttributeValue> {
        let entity = self.entity(id)?;
        let schema = self.schema_of(&entity)?;
        let descriptor = schema
            .property(property)
            .ok_or_else(|| ModelError::unknown_attribute(schema.name(), property))?;
        Ok(self.value(&entity, descriptor))
    }

    /// Entities referenced through a property
    pub fn related(
        &self,
        entity: &DecodedEntity,
        descriptor: &PropertyDescriptor,
    ) -> Vec<EntityId> {
        if descriptor.is_inverse() {
            return self.inverses.inverse_of(self.model, entity.id, descriptor);
        }
        self.value(entity, descriptor).entity_refs()
    }

    /// Entities referenced through a property, by name
    pub fn related_by_name(&self, id: EntityId, property: &str) -> Result<Vec<EntityId>> {
        let entity = self.entity(id)?;
        let schema = self.schema_of(&entity)?;
        let descriptor = schema
            .property(property)
            .ok_or_else(|| ModelError::unknown_attribute(schema.name(), property))?;
        Ok(self.related(&entity, descriptor))
    }

    /// Whether the entity's type is `ancestor` or a subtype of it
    pub fn is_a(&self, id: EntityId, ancestor: &str) -> bool {
        let schema = self.model.schema();
        self.model
            .resolver()
            .get(id)
            .map(|e| schema.is_subtype_of(e.ifc_type.name(), ancestor))
            .unwrap_or(false)
    }
}
