// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fluent entity construction

use crate::MemoryModel;
use ifc_lite_model::{AttributeValue, EntityId, Result};

/// Builds one entity, attributes set by name
///
/// The first failure (type or attribute) is kept and reported by
/// [`EntityBuilder::finish`]; later setters become no-ops.
///
/// ```ignore
/// let crs = model
///     .build("IfcProjectedCRS")
///     .with("Name", "EPSG:25832")
///     .with("GeodeticDatum", "ETRS89")
///     .finish()?;
/// ```
pub struct EntityBuilder<'a> {
    model: &'a mut MemoryModel,
    state: Result<EntityId>,
}

impl<'a> EntityBuilder<'a> {
    pub(crate) fn new(model: &'a mut MemoryModel, type_name: &str) -> Self {
        let state = model.create(type_name);
        Self { model, state }
    }

    /// Set an attribute by name
    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        if let Ok(id) = self.state {
            if let Err(err) = self.model.set(id, name, value) {
                self.state = Err(err);
            }
        }
        self
    }

    /// Set an attribute only when a value is present
    pub fn with_opt<V: Into<AttributeValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Set an attribute by position
    pub fn with_index(mut self, index: usize, value: impl Into<AttributeValue>) -> Self {
        if let Ok(id) = self.state {
            if let Err(err) = self.model.set_attribute(id, index, value.into()) {
                self.state = Err(err);
            }
        }
        self
    }

    /// Label of the entity under construction
    pub fn id(&self) -> Option<EntityId> {
        self.state.as_ref().ok().copied()
    }

    /// Label of the new entity, or the first error
    ///
    /// A failed build leaves the created entity in place; the surrounding
    /// transaction decides whether it survives.
    pub fn finish(self) -> Result<EntityId> {
        self.state
    }
}

impl std::fmt::Debug for EntityBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityBuilder")
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_lite_model::{EntityResolver, ModelError, SchemaRegistry};

    #[test]
    fn test_builder_sets_named_attributes() {
        let mut model = MemoryModel::new(SchemaRegistry::ifc4());
        model.begin_transaction("t").unwrap();
        let point = model
            .build("IfcCartesianPoint")
            .with("Coordinates", vec![1.0, 2.0, 3.0])
            .finish()
            .unwrap();
        let placement = model
            .build("IfcAxis2Placement3D")
            .with("Location", point)
            .with_opt::<EntityId>("Axis", None)
            .finish()
            .unwrap();

        let entity = model.get(placement).unwrap();
        assert_eq!(entity.get_ref(0), Some(point));
        assert!(entity.get(1).unwrap().is_null());
    }

    #[test]
    fn test_builder_reports_first_error() {
        let mut model = MemoryModel::new(SchemaRegistry::ifc4());
        model.begin_transaction("t").unwrap();
        let err = model
            .build("IfcSIUnit")
            .with("Bogus", 1.0)
            .with("Name", AttributeValue::enumeration("METRE"))
            .finish()
            .unwrap_err();
        match err {
            ModelError::UnknownAttribute { attribute, .. } => assert_eq!(attribute, "Bogus"),
            other => panic!("unexpected error {other:?}"),
        }

        let err = model.build("IfcNamedUnit").finish().unwrap_err();
        assert!(matches!(err, ModelError::AbstractType(_)));
    }
}
