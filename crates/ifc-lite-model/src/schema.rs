// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runtime schema registry
//!
//! Entity types are declared as [`EntityDef`]s and flattened once, when the
//! registry is built, into [`EntitySchema`]s carrying positional
//! [`PropertyDescriptor`]s for inherited and own attributes. Inverse
//! attributes are resolved against their source type at the same time, so a
//! lookup never walks the type hierarchy again.

use crate::{ModelError, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Shape of an attribute value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Plain data (strings, numbers, enums, typed values, data lists)
    Data,
    /// Single entity reference
    Entity,
    /// Collection of entity references
    EntityList,
}

/// Cardinality of an inverse attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    Set,
}

/// Forward attribute declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: String,
    pub kind: ValueKind,
}

/// Inverse attribute declaration
///
/// `source_type.source_attribute` is the forward attribute whose references
/// point back at the declaring type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InverseDef {
    pub name: String,
    pub source_type: String,
    pub source_attribute: String,
    pub cardinality: Cardinality,
}

/// Entity type declaration with only its own attributes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDef {
    pub name: String,
    pub supertype: Option<String>,
    pub is_abstract: bool,
    pub attributes: Vec<AttributeDef>,
    pub inverses: Vec<InverseDef>,
}

impl EntityDef {
    /// Declare an instantiable type
    pub fn concrete(name: &str, supertype: Option<&str>) -> Self {
        Self::declare(name, supertype, false)
    }

    /// Declare an abstract type
    pub fn abstract_type(name: &str, supertype: Option<&str>) -> Self {
        Self::declare(name, supertype, true)
    }

    fn declare(name: &str, supertype: Option<&str>, is_abstract: bool) -> Self {
        Self {
            name: name.to_uppercase(),
            supertype: supertype.map(str::to_uppercase),
            is_abstract,
            attributes: Vec::new(),
            inverses: Vec::new(),
        }
    }

    /// Add a data attribute
    pub fn data(self, name: &str) -> Self {
        self.attribute(name, ValueKind::Data)
    }

    /// Add a single entity reference attribute
    pub fn entity(self, name: &str) -> Self {
        self.attribute(name, ValueKind::Entity)
    }

    /// Add an entity collection attribute
    pub fn entities(self, name: &str) -> Self {
        self.attribute(name, ValueKind::EntityList)
    }

    pub fn attribute(mut self, name: &str, kind: ValueKind) -> Self {
        self.attributes.push(AttributeDef {
            name: name.to_string(),
            kind,
        });
        self
    }

    /// Add an inverse attribute holding at most one referrer
    pub fn inverse_single(self, name: &str, source_type: &str, source_attribute: &str) -> Self {
        self.inverse(name, source_type, source_attribute, Cardinality::Single)
    }

    /// Add an inverse attribute holding a set of referrers
    pub fn inverse_set(self, name: &str, source_type: &str, source_attribute: &str) -> Self {
        self.inverse(name, source_type, source_attribute, Cardinality::Set)
    }

    fn inverse(
        mut self,
        name: &str,
        source_type: &str,
        source_attribute: &str,
        cardinality: Cardinality,
    ) -> Self {
        self.inverses.push(InverseDef {
            name: name.to_string(),
            source_type: source_type.to_uppercase(),
            source_attribute: source_attribute.to_string(),
            cardinality,
        });
        self
    }
}

/// Resolved origin of an inverse property
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InverseSource {
    /// Type declaring the forward attribute
    pub source_type: String,
    /// Forward attribute name
    pub source_attribute: String,
    /// Position of the forward attribute in the flattened source type
    pub source_index: usize,
}

/// Capability view of a single entity property
///
/// `index` is the attribute position for forward properties and the position
/// within the inverse list for inverse properties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub index: usize,
    pub kind: ValueKind,
    pub inverse: Option<InverseSource>,
}

impl PropertyDescriptor {
    /// Whether the property holds entities rather than plain data
    pub fn is_reference(&self) -> bool {
        self.kind != ValueKind::Data
    }

    /// Whether the property holds a collection of entities
    pub fn is_collection(&self) -> bool {
        self.kind == ValueKind::EntityList
    }

    /// Whether the property is a back-reference
    pub fn is_inverse(&self) -> bool {
        self.inverse.is_some()
    }
}

/// Flattened entity type
#[derive(Clone, Debug)]
pub struct EntitySchema {
    name: String,
    is_abstract: bool,
    /// Self first, then supertypes up to the root
    ancestry: Vec<String>,
    attributes: Vec<PropertyDescriptor>,
    inverses: Vec<PropertyDescriptor>,
    by_name: FxHashMap<String, (bool, usize)>,
}

impl EntitySchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Type names from this type up to the root
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    pub fn supertype(&self) -> Option<&str> {
        self.ancestry.get(1).map(String::as_str)
    }

    pub fn is_subtype_of(&self, ancestor: &str) -> bool {
        self.ancestry
            .iter()
            .any(|name| name.eq_ignore_ascii_case(ancestor))
    }

    /// Forward attributes in positional order
    pub fn attributes(&self) -> &[PropertyDescriptor] {
        &self.attributes
    }

    /// Inverse attributes
    pub fn inverses(&self) -> &[PropertyDescriptor] {
        &self.inverses
    }

    /// Forward properties followed by inverse properties
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.attributes.iter().chain(self.inverses.iter())
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Look up a forward or inverse property by name
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        let (inverse, index) = *self.by_name.get(name)?;
        if inverse {
            self.inverses.get(index)
        } else {
            self.attributes.get(index)
        }
    }

    /// Position of a forward attribute
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.property(name)
            .filter(|p| !p.is_inverse())
            .map(|p| p.index)
    }
}

/// Runtime type registry keyed by upper-case type name
#[derive(Debug)]
pub struct SchemaRegistry {
    name: String,
    types: FxHashMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    /// Build a registry, flattening every declaration
    pub fn new(name: impl Into<String>, definitions: Vec<EntityDef>) -> Result<Self> {
        let mut defs: FxHashMap<String, EntityDef> = FxHashMap::default();
        for def in definitions {
            if defs.contains_key(&def.name) {
                return Err(ModelError::invalid_schema(format!(
                    "type {} declared twice",
                    def.name
                )));
            }
            defs.insert(def.name.clone(), def);
        }

        // Pass 1: ancestry and forward attributes
        let mut flat: FxHashMap<String, EntitySchema> = FxHashMap::default();
        for name in defs.keys() {
            let ancestry = ancestry_of(&defs, name)?;
            let mut attributes = Vec::new();
            for type_name in ancestry.iter().rev() {
                if let Some(def) = defs.get(type_name) {
                    for attr in &def.attributes {
                        attributes.push(PropertyDescriptor {
                            name: attr.name.clone(),
                            index: attributes.len(),
                            kind: attr.kind,
                            inverse: None,
                        });
                    }
                }
            }
            let is_abstract = defs.get(name).map(|d| d.is_abstract).unwrap_or(false);
            flat.insert(
                name.clone(),
                EntitySchema {
                    name: name.clone(),
                    is_abstract,
                    ancestry,
                    attributes,
                    inverses: Vec::new(),
                    by_name: FxHashMap::default(),
                },
            );
        }

        // Pass 2: inverses, resolved against flattened source types
        let mut resolved: FxHashMap<String, Vec<PropertyDescriptor>> = FxHashMap::default();
        for (name, schema) in &flat {
            let mut inverses = Vec::new();
            for type_name in schema.ancestry.iter().rev() {
                let Some(def) = defs.get(type_name) else {
                    continue;
                };
                for inv in &def.inverses {
                    let source = flat.get(&inv.source_type).ok_or_else(|| {
                        ModelError::invalid_schema(format!(
                            "inverse {}.{} refers to unknown type {}",
                            type_name, inv.name, inv.source_type
                        ))
                    })?;
                    let attr = source
                        .attributes
                        .iter()
                        .find(|a| a.name == inv.source_attribute)
                        .filter(|a| a.is_reference())
                        .ok_or_else(|| {
                            ModelError::invalid_schema(format!(
                                "inverse {}.{} refers to {}.{} which is not an entity attribute",
                                type_name, inv.name, inv.source_type, inv.source_attribute
                            ))
                        })?;
                    inverses.push(PropertyDescriptor {
                        name: inv.name.clone(),
                        index: inverses.len(),
                        kind: match inv.cardinality {
                            Cardinality::Single => ValueKind::Entity,
                            Cardinality::Set => ValueKind::EntityList,
                        },
                        inverse: Some(InverseSource {
                            source_type: inv.source_type.clone(),
                            source_attribute: inv.source_attribute.clone(),
                            source_index: attr.index,
                        }),
                    });
                }
            }
            resolved.insert(name.clone(), inverses);
        }

        let mut types = FxHashMap::default();
        for (name, mut schema) in flat {
            schema.inverses = resolved.remove(&name).unwrap_or_default();
            let mut by_name = FxHashMap::default();
            for p in &schema.attributes {
                if by_name.insert(p.name.clone(), (false, p.index)).is_some() {
                    return Err(ModelError::invalid_schema(format!(
                        "attribute {}.{} declared twice",
                        name, p.name
                    )));
                }
            }
            for p in &schema.inverses {
                if by_name.insert(p.name.clone(), (true, p.index)).is_some() {
                    return Err(ModelError::invalid_schema(format!(
                        "inverse {}.{} clashes with another attribute",
                        name, p.name
                    )));
                }
            }
            schema.by_name = by_name;
            types.insert(name, Arc::new(schema));
        }

        Ok(Self {
            name: name.into(),
            types,
        })
    }

    /// Registry without any types
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: FxHashMap::default(),
        }
    }

    /// Built-in IFC4 subset, shared across the process
    pub fn ifc4() -> Arc<SchemaRegistry> {
        static IFC4: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();
        IFC4.get_or_init(|| {
            Arc::new(
                SchemaRegistry::new("IFC4", crate::ifc4::definitions())
                    .unwrap_or_else(|_| SchemaRegistry::empty("IFC4")),
            )
        })
        .clone()
    }

    /// Schema identifier (e.g. "IFC4")
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(&type_name.to_uppercase())
    }

    /// Flattened type by name (case-insensitive)
    pub fn entity(&self, type_name: &str) -> Result<&Arc<EntitySchema>> {
        self.types
            .get(&type_name.to_uppercase())
            .ok_or_else(|| ModelError::UnknownType(type_name.to_uppercase()))
    }

    /// Whether `type_name` is `ancestor` or one of its subtypes
    ///
    /// Unknown types are subtypes of nothing.
    pub fn is_subtype_of(&self, type_name: &str, ancestor: &str) -> bool {
        self.entity(type_name)
            .map(|schema| schema.is_subtype_of(ancestor))
            .unwrap_or(false)
    }

    /// Property of a type by name
    pub fn property(&self, type_name: &str, property: &str) -> Result<&PropertyDescriptor> {
        let schema = self.entity(type_name)?;
        schema
            .property(property)
            .ok_or_else(|| ModelError::unknown_attribute(schema.name(), property))
    }

    /// All type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn ancestry_of(defs: &FxHashMap<String, EntityDef>, name: &str) -> Result<Vec<String>> {
    let mut chain = vec![name.to_string()];
    let mut seen = FxHashSet::default();
    seen.insert(name.to_string());
    let mut current = defs.get(name).and_then(|d| d.supertype.clone());
    while let Some(parent) = current {
        let def = defs.get(&parent).ok_or_else(|| {
            ModelError::invalid_schema(format!("{} has unknown supertype {}", name, parent))
        })?;
        if !seen.insert(parent.clone()) {
            return Err(ModelError::invalid_schema(format!("cyclic supertype chain at {}", name)));
        }
        chain.push(parent);
        current = def.supertype.clone();
    }
    Ok(chain)
}
