// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MemoryModel - in-memory, transactional IFC entity store

use crate::builder::EntityBuilder;
use crate::units::derive_factors;
use ifc_lite_model::{
    AttributeValue, DecodedEntity, EntityId, EntityResolver, EntitySchema, IfcModel, IfcType,
    ModelError, ModelFactors, ModelId, ModelMetadata, Result, SchemaRegistry, ValueKind,
};
use rustc_hash::FxHashMap;
use std::convert::Infallible;
use std::sync::Arc;

/// Inverse of a journaled mutation
#[derive(Debug)]
enum Undo {
    Created(EntityId),
    Attribute {
        id: EntityId,
        index: usize,
        previous: AttributeValue,
    },
    Deleted {
        entity: Arc<DecodedEntity>,
        position: usize,
    },
}

/// Open write session
#[derive(Debug)]
struct Journal {
    name: String,
    undo: Vec<Undo>,
    next_label: u32,
    factors: ModelFactors,
    metadata: ModelMetadata,
}

/// In-memory entity store implementing the `IfcModel` trait
///
/// Entities keep their declaration order, which is the enumeration order of
/// [`EntityResolver::all_ids`]. Every mutation must happen inside a
/// transaction; [`MemoryModel::rollback`] undoes the journal in reverse order.
#[derive(Debug)]
pub struct MemoryModel {
    id: ModelId,
    schema: Arc<SchemaRegistry>,
    entities: FxHashMap<EntityId, Arc<DecodedEntity>>,
    /// Declaration order
    order: Vec<EntityId>,
    /// Type -> entity IDs index
    type_index: FxHashMap<IfcType, Vec<EntityId>>,
    next_label: u32,
    factors: ModelFactors,
    metadata: ModelMetadata,
    journal: Option<Journal>,
}

impl MemoryModel {
    /// Create an empty store for a schema
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        let metadata = ModelMetadata {
            schema_version: schema.name().to_string(),
            ..Default::default()
        };
        Self {
            id: ModelId::next(),
            schema,
            entities: FxHashMap::default(),
            order: Vec::new(),
            type_index: FxHashMap::default(),
            next_label: 1,
            factors: ModelFactors::default(),
            metadata,
            journal: None,
        }
    }

    /// Load pre-labelled entities in declaration order
    ///
    /// Every entity is checked against the schema and every reference must
    /// resolve once all entities are loaded. Factors are derived from the
    /// project's unit assignment.
    pub fn from_entities(
        schema: Arc<SchemaRegistry>,
        entities: impl IntoIterator<Item = DecodedEntity>,
    ) -> Result<Self> {
        let mut model = Self::new(schema);
        model.begin_transaction("load")?;
        for entity in entities {
            if let Err(err) = model.insert(entity) {
                model.rollback()?;
                return Err(err);
            }
        }
        if let Err(err) = model.validate() {
            model.rollback()?;
            return Err(err);
        }
        model.factors = derive_factors(&model);
        model.commit()?;
        Ok(model)
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Shared schema handle
    pub fn schema_arc(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.schema)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a write session; nested sessions are rejected
    pub fn begin_transaction(&mut self, name: &str) -> Result<()> {
        if let Some(journal) = &self.journal {
            return Err(ModelError::TransactionActive(journal.name.clone()));
        }
        log::debug!("{}: begin transaction '{}'", self.id, name);
        self.journal = Some(Journal {
            name: name.to_string(),
            undo: Vec::new(),
            next_label: self.next_label,
            factors: self.factors,
            metadata: self.metadata.clone(),
        });
        Ok(())
    }

    /// Keep every mutation of the open session
    pub fn commit(&mut self) -> Result<()> {
        let journal = self.journal.take().ok_or(ModelError::NoTransaction)?;
        log::debug!(
            "{}: commit '{}' ({} changes)",
            self.id,
            journal.name,
            journal.undo.len()
        );
        Ok(())
    }

    /// Undo every mutation of the open session
    pub fn rollback(&mut self) -> Result<()> {
        let journal = self.journal.take().ok_or(ModelError::NoTransaction)?;
        log::debug!(
            "{}: rollback '{}' ({} changes)",
            self.id,
            journal.name,
            journal.undo.len()
        );
        for undo in journal.undo.into_iter().rev() {
            match undo {
                Undo::Created(id) => {
                    if let Some(entity) = self.entities.remove(&id) {
                        if let Some(pos) = self.order.iter().rposition(|e| *e == id) {
                            self.order.remove(pos);
                        }
                        if let Some(ids) = self.type_index.get_mut(&entity.ifc_type) {
                            ids.retain(|e| *e != id);
                        }
                    }
                }
                Undo::Attribute {
                    id,
                    index,
                    previous,
                } => {
                    if let Some(entity) = self.entities.get_mut(&id) {
                        if let Some(slot) = Arc::make_mut(entity).attributes.get_mut(index) {
                            *slot = previous;
                        }
                    }
                }
                Undo::Deleted { entity, position } => {
                    let id = entity.id;
                    let ifc_type = entity.ifc_type.clone();
                    self.entities.insert(id, entity);
                    self.order.insert(position.min(self.order.len()), id);
                    self.reindex_type(&ifc_type);
                }
            }
        }
        self.next_label = journal.next_label;
        self.factors = journal.factors;
        self.metadata = journal.metadata;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    pub fn transaction_name(&self) -> Option<&str> {
        self.journal.as_ref().map(|j| j.name.as_str())
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`
    pub fn transact<T, E>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<ModelError>,
    {
        self.begin_transaction(name)?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback()?;
                Err(err)
            }
        }
    }

    fn journal(&mut self) -> Result<&mut Journal> {
        self.journal.as_mut().ok_or(ModelError::NoTransaction)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Instantiate a typed entity with all attributes `Null`
    pub fn create(&mut self, type_name: &str) -> Result<EntityId> {
        self.journal()?;
        let schema = self.instantiable(type_name)?;
        let ifc_type = IfcType::parse(schema.name());
        let attributes = vec![AttributeValue::Null; schema.attribute_count()];

        while self.entities.contains_key(&EntityId(self.next_label)) {
            self.next_label += 1;
        }
        let id = EntityId(self.next_label);
        self.next_label += 1;

        self.store(DecodedEntity::new(id, ifc_type, attributes));
        self.journal()?.undo.push(Undo::Created(id));
        Ok(id)
    }

    /// Store a pre-labelled entity
    ///
    /// Attribute lists shorter than the type declares are padded with `Null`.
    /// References are not required to resolve yet, see [`MemoryModel::validate`].
    pub fn insert(&mut self, mut entity: DecodedEntity) -> Result<EntityId> {
        self.journal()?;
        if self.entities.contains_key(&entity.id) {
            return Err(ModelError::DuplicateEntity(entity.id));
        }
        let schema = self.instantiable(entity.ifc_type.name())?;
        let count = schema.attribute_count();
        if entity.attributes.len() > count {
            return Err(ModelError::AttributeIndex {
                entity: entity.id,
                index: entity.attributes.len() - 1,
                count,
            });
        }
        for (descriptor, value) in schema.attributes().iter().zip(&entity.attributes) {
            check_kind(entity.id, &schema, descriptor.kind, value)?;
        }
        entity.attributes.resize(count, AttributeValue::Null);

        let id = entity.id;
        self.next_label = self.next_label.max(id.0.saturating_add(1));
        self.store(entity);
        self.journal()?.undo.push(Undo::Created(id));
        Ok(id)
    }

    /// Write an attribute by position
    pub fn set_attribute(
        &mut self,
        id: EntityId,
        index: usize,
        value: AttributeValue,
    ) -> Result<()> {
        self.journal()?;
        let entity = self
            .entities
            .get(&id)
            .ok_or(ModelError::EntityNotFound(id))?;
        let schema = Arc::clone(self.schema.entity(entity.ifc_type.name())?);
        let descriptor = schema
            .attributes()
            .get(index)
            .ok_or(ModelError::AttributeIndex {
                entity: id,
                index,
                count: schema.attribute_count(),
            })?;
        check_kind(id, &schema, descriptor.kind, &value)?;
        if let Some(missing) = value.entity_refs().into_iter().find(|r| !self.contains(*r)) {
            return Err(ModelError::EntityNotFound(missing));
        }
        self.write(id, index, value)
    }

    /// Write an attribute by name
    pub fn set(
        &mut self,
        id: EntityId,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<()> {
        let index = self.attribute_index(id, name)?;
        self.set_attribute(id, index, value.into())
    }

    /// Remove an entity and every reference to it
    ///
    /// Single references become `Null`, collection members are removed.
    pub fn delete(&mut self, id: EntityId) -> Result<()> {
        self.journal()?;
        if !self.contains(id) {
            return Err(ModelError::EntityNotFound(id));
        }

        let mut unlinks = Vec::new();
        for other in &self.order {
            if *other == id {
                continue;
            }
            let Some(entity) = self.entities.get(other) else {
                continue;
            };
            for (index, value) in entity.attributes.iter().enumerate() {
                if !value.entity_refs().contains(&id) {
                    continue;
                }
                let mut others = |r: EntityId| Ok((r != id).then_some(r));
                let unlinked = match value.try_map_refs::<Infallible>(&mut others) {
                    Ok(unlinked) => unlinked,
                    Err(never) => match never {},
                };
                unlinks.push((*other, index, unlinked));
            }
        }
        for (other, index, value) in unlinks {
            self.write(other, index, value)?;
        }

        let position = self
            .order
            .iter()
            .position(|e| *e == id)
            .unwrap_or(self.order.len());
        if let Some(entity) = self.entities.remove(&id) {
            self.order.remove(position);
            if let Some(ids) = self.type_index.get_mut(&entity.ifc_type) {
                ids.retain(|e| *e != id);
            }
            self.journal()?
                .undo
                .push(Undo::Deleted { entity, position });
        }
        Ok(())
    }

    /// Mirror numeric factors from another store
    pub fn initialise_factors(&mut self, factors: ModelFactors) -> Result<()> {
        self.journal()?;
        self.factors = factors;
        Ok(())
    }

    pub fn set_metadata(&mut self, metadata: ModelMetadata) -> Result<()> {
        self.journal()?;
        self.metadata = metadata;
        Ok(())
    }

    /// Start building a new entity, attributes set by name
    pub fn build(&mut self, type_name: &str) -> EntityBuilder<'_> {
        EntityBuilder::new(self, type_name)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Attribute value by name
    pub fn attribute(&self, id: EntityId, name: &str) -> Result<AttributeValue> {
        let index = self.attribute_index(id, name)?;
        let entity = self
            .entities
            .get(&id)
            .ok_or(ModelError::EntityNotFound(id))?;
        Ok(entity.get(index).cloned().unwrap_or_default())
    }

    /// Position of a named attribute on an entity's type
    pub fn attribute_index(&self, id: EntityId, name: &str) -> Result<usize> {
        let entity = self
            .entities
            .get(&id)
            .ok_or(ModelError::EntityNotFound(id))?;
        let schema = self.schema.entity(entity.ifc_type.name())?;
        schema
            .attribute_index(name)
            .ok_or_else(|| ModelError::unknown_attribute(schema.name(), name))
    }

    /// Check that every reference resolves
    pub fn validate(&self) -> Result<()> {
        for id in &self.order {
            if let Some(entity) = self.entities.get(id) {
                for value in &entity.attributes {
                    if let Some(missing) = value
                        .entity_refs()
                        .into_iter()
                        .find(|r| !self.contains(*r))
                    {
                        return Err(ModelError::other(format!(
                            "entity {} references missing entity {}",
                            id, missing
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn instantiable(&self, type_name: &str) -> Result<Arc<EntitySchema>> {
        let schema = self.schema.entity(type_name)?;
        if schema.is_abstract() {
            return Err(ModelError::AbstractType(schema.name().to_string()));
        }
        Ok(Arc::clone(schema))
    }

    fn store(&mut self, entity: DecodedEntity) {
        let id = entity.id;
        self.type_index
            .entry(entity.ifc_type.clone())
            .or_default()
            .push(id);
        self.order.push(id);
        self.entities.insert(id, Arc::new(entity));
    }

    fn write(&mut self, id: EntityId, index: usize, value: AttributeValue) -> Result<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(ModelError::EntityNotFound(id))?;
        let count = entity.attributes.len();
        let slot = Arc::make_mut(entity)
            .attributes
            .get_mut(index)
            .ok_or(ModelError::AttributeIndex {
                entity: id,
                index,
                count,
            })?;
        let previous = std::mem::replace(slot, value);
        self.journal()?.undo.push(Undo::Attribute {
            id,
            index,
            previous,
        });
        Ok(())
    }

    fn reindex_type(&mut self, ifc_type: &IfcType) {
        let ids: Vec<EntityId> = self
            .order
            .iter()
            .filter(|id| {
                self.entities
                    .get(id)
                    .map(|e| &e.ifc_type == ifc_type)
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        self.type_index.insert(ifc_type.clone(), ids);
    }
}

fn value_shape(value: &AttributeValue) -> &'static str {
    match value {
        AttributeValue::Null => "null",
        AttributeValue::Derived => "derived",
        AttributeValue::EntityRef(_) => "entity reference",
        AttributeValue::Bool(_) => "boolean",
        AttributeValue::Integer(_) => "integer",
        AttributeValue::Float(_) => "real",
        AttributeValue::String(_) => "string",
        AttributeValue::Enum(_) => "enumeration",
        AttributeValue::List(_) => "list",
        AttributeValue::TypedValue(_, _) => "typed value",
    }
}

fn check_kind(
    id: EntityId,
    schema: &EntitySchema,
    kind: ValueKind,
    value: &AttributeValue,
) -> Result<()> {
    let fits = match kind {
        ValueKind::Data => value.entity_refs().is_empty(),
        ValueKind::Entity => matches!(
            value,
            AttributeValue::Null | AttributeValue::Derived | AttributeValue::EntityRef(_)
        ),
        ValueKind::EntityList => match value {
            AttributeValue::Null | AttributeValue::Derived => true,
            AttributeValue::List(items) => items
                .iter()
                .all(|item| matches!(item, AttributeValue::EntityRef(_))),
            _ => false,
        },
    };
    if fits {
        return Ok(());
    }
    let expected = match kind {
        ValueKind::Data => "data",
        ValueKind::Entity => "entity reference",
        ValueKind::EntityList => "entity list",
    };
    Err(ModelError::schema_mismatch(id, schema.name(), expected, value_shape(value)))
}

impl EntityResolver for MemoryModel {
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        self.entities.get(&id).cloned()
    }

    fn entities_by_type(&self, ifc_type: &IfcType) -> Vec<Arc<DecodedEntity>> {
        self.type_index
            .get(ifc_type)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    fn count_by_type(&self, ifc_type: &IfcType) -> usize {
        self.type_index.get(ifc_type).map(|v| v.len()).unwrap_or(0)
    }

    fn all_ids(&self) -> Vec<EntityId> {
        self.order.clone()
    }

    fn entity_count(&self) -> usize {
        self.order.len()
    }
}

impl IfcModel for MemoryModel {
    fn model_id(&self) -> ModelId {
        self.id
    }

    fn resolver(&self) -> &dyn EntityResolver {
        self
    }

    fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    fn factors(&self) -> ModelFactors {
        self.factors
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> MemoryModel {
        MemoryModel::new(SchemaRegistry::ifc4())
    }

    #[test]
    fn test_create_requires_transaction() {
        let mut model = empty();
        assert_eq!(model.create("IFCWALL"), Err(ModelError::NoTransaction));
    }

    #[test]
    fn test_nested_transaction_rejected() {
        let mut model = empty();
        model.begin_transaction("outer").unwrap();
        assert!(matches!(
            model.begin_transaction("inner"),
            Err(ModelError::TransactionActive(name)) if name == "outer"
        ));
    }

    #[test]
    fn test_create_typed_entity() {
        let mut model = empty();
        let wall = model
            .transact("create", |m| {
                let wall = m.create("IfcWall")?;
                m.set(wall, "Name", "Wall 1")?;
                Ok::<_, ModelError>(wall)
            })
            .unwrap();

        let entity = model.get(wall).unwrap();
        assert_eq!(entity.ifc_type, IfcType::IfcWall);
        assert_eq!(entity.attributes.len(), 9);
        assert_eq!(
            model.attribute(wall, "Name").unwrap(),
            AttributeValue::from("Wall 1")
        );
        assert_eq!(model.count_by_type(&IfcType::IfcWall), 1);
    }

    #[test]
    fn test_abstract_and_unknown_types_rejected() {
        let mut model = empty();
        model.begin_transaction("t").unwrap();
        assert!(matches!(
            model.create("IfcProduct"),
            Err(ModelError::AbstractType(_))
        ));
        assert!(matches!(
            model.create("IfcNotAThing"),
            Err(ModelError::UnknownType(_))
        ));
    }

    #[test]
    fn test_schema_mismatch_on_reference_slot() {
        let mut model = empty();
        model.begin_transaction("t").unwrap();
        let rel = model.create("IFCRELAGGREGATES").unwrap();
        let err = model
            .set(rel, "RelatingObject", "not an entity")
            .unwrap_err();
        assert!(matches!(err, ModelError::SchemaMismatch { .. }));
        let err = model.set(rel, "RelatingObject", EntityId(999)).unwrap_err();
        assert_eq!(err, ModelError::EntityNotFound(EntityId(999)));
    }

    #[test]
    fn test_rollback_restores_everything() {
        let mut model = empty();
        let (site, building) = model
            .transact("seed", |m| {
                let site = m.create("IFCSITE")?;
                let building = m.create("IFCBUILDING")?;
                m.set(site, "Name", "Site")?;
                Ok::<_, ModelError>((site, building))
            })
            .unwrap();

        model.begin_transaction("edit").unwrap();
        let rel = model.create("IFCRELAGGREGATES").unwrap();
        model.set(rel, "RelatingObject", site).unwrap();
        model.set(rel, "RelatedObjects", vec![building]).unwrap();
        model.set(site, "Name", "Renamed").unwrap();
        model.delete(building).unwrap();
        model
            .initialise_factors(ModelFactors::new(1.0, 0.001, 1e-6))
            .unwrap();
        model.rollback().unwrap();

        assert_eq!(model.all_ids(), vec![site, building]);
        assert!(!model.contains(rel));
        assert_eq!(
            model.attribute(site, "Name").unwrap(),
            AttributeValue::from("Site")
        );
        assert_eq!(model.factors(), ModelFactors::default());

        // label counter restored
        model.begin_transaction("again").unwrap();
        assert_eq!(model.create("IFCWALL").unwrap(), rel);
    }

    #[test]
    fn test_delete_unlinks_references() {
        let mut model = empty();
        model.begin_transaction("t").unwrap();
        let a = model.create("IFCBUILDINGSTOREY").unwrap();
        let b = model.create("IFCBUILDINGSTOREY").unwrap();
        let site = model.create("IFCSITE").unwrap();
        let rel = model.create("IFCRELAGGREGATES").unwrap();
        model.set(rel, "RelatingObject", site).unwrap();
        model.set(rel, "RelatedObjects", vec![a, b]).unwrap();

        model.delete(a).unwrap();
        assert_eq!(
            model.attribute(rel, "RelatedObjects").unwrap(),
            AttributeValue::refs([b])
        );
        model.delete(site).unwrap();
        assert!(model.attribute(rel, "RelatingObject").unwrap().is_null());
        model.commit().unwrap();
        assert_eq!(model.all_ids(), vec![b, rel]);
    }

    #[test]
    fn test_delete_unlinks_every_referrer_and_rolls_back() {
        let mut model = empty();
        model.begin_transaction("t").unwrap();
        let site = model.create("IFCSITE").unwrap();
        let storey = model.create("IFCBUILDINGSTOREY").unwrap();
        let rel = model.create("IFCRELAGGREGATES").unwrap();
        model.set(rel, "RelatingObject", site).unwrap();
        model.set(rel, "RelatedObjects", vec![storey]).unwrap();
        let nest = model.create("IFCRELNESTS").unwrap();
        model.set(nest, "RelatingObject", storey).unwrap();
        model.commit().unwrap();

        model.begin_transaction("delete").unwrap();
        model.delete(storey).unwrap();
        assert!(model.attribute(rel, "RelatedObjects").unwrap().is_null());
        assert!(model.attribute(nest, "RelatingObject").unwrap().is_null());
        model.rollback().unwrap();

        assert_eq!(
            model.attribute(rel, "RelatedObjects").unwrap(),
            AttributeValue::refs([storey])
        );
        assert_eq!(
            model.attribute(nest, "RelatingObject").unwrap(),
            AttributeValue::EntityRef(storey)
        );
    }

    #[test]
    fn test_from_entities_rejects_dangling_reference() {
        let entities = vec![DecodedEntity::new(
            EntityId(1),
            IfcType::IfcUnitAssignment,
            vec![vec![EntityId(2)].into()],
        )];
        let err = MemoryModel::from_entities(SchemaRegistry::ifc4(), entities).unwrap_err();
        assert!(matches!(err, ModelError::Other(_)));
    }

    #[test]
    fn test_insert_pads_and_keeps_declaration_order() {
        let entities = vec![
            DecodedEntity::new(EntityId(10), IfcType::IfcWall, vec!["g".into()]),
            DecodedEntity::new(EntityId(3), IfcType::IfcSlab, vec![]),
        ];
        let mut model = MemoryModel::from_entities(SchemaRegistry::ifc4(), entities).unwrap();
        assert_eq!(model.all_ids(), vec![EntityId(10), EntityId(3)]);
        assert_eq!(model.get(EntityId(3)).unwrap().attributes.len(), 9);

        model.begin_transaction("t").unwrap();
        assert_eq!(model.create("IFCBEAM").unwrap(), EntityId(11));
    }
}
