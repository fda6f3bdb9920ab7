// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for IFC entity graphs
//!
//! Identities, type tags, attribute values and the positional entity record
//! shared by every store and by the transformation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Type-safe entity identifier
///
/// Wraps the raw IFC entity label (e.g., #123 becomes EntityId(123))
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an entity store
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ModelId(pub u64);

impl ModelId {
    /// Allocate a fresh store identity
    pub fn next() -> Self {
        ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Store-qualified entity identity (store reference + label)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct InstanceHandle {
    /// Owning store
    pub model: ModelId,
    /// Entity label within the store
    pub label: EntityId,
}

impl InstanceHandle {
    pub fn new(model: ModelId, label: EntityId) -> Self {
        Self { model, label }
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.label, self.model)
    }
}

macro_rules! ifc_types {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// IFC entity type enumeration
        ///
        /// Covers the entity types known to the built-in schema. Unknown types
        /// are captured with their upper-case STEP name.
        #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum IfcType {
            $($variant,)*
            /// Unknown type - stores the upper-case type name
            Unknown(String),
        }

        impl IfcType {
            /// Parse a type name string into an IfcType (case-insensitive)
            pub fn parse(s: &str) -> Self {
                let upper = s.to_uppercase();
                match upper.as_str() {
                    $($name => IfcType::$variant,)*
                    _ => IfcType::Unknown(upper),
                }
            }

            /// Get the upper-case STEP type name
            pub fn name(&self) -> &str {
                match self {
                    $(IfcType::$variant => $name,)*
                    IfcType::Unknown(s) => s,
                }
            }
        }
    };
}

ifc_types! {
    // Rooted objects
    IfcRoot => "IFCROOT",
    IfcObjectDefinition => "IFCOBJECTDEFINITION",
    IfcObject => "IFCOBJECT",
    IfcProduct => "IFCPRODUCT",
    IfcContext => "IFCCONTEXT",
    IfcProject => "IFCPROJECT",

    // Spatial structure
    IfcSpatialElement => "IFCSPATIALELEMENT",
    IfcSpatialStructureElement => "IFCSPATIALSTRUCTUREELEMENT",
    IfcSite => "IFCSITE",
    IfcBuilding => "IFCBUILDING",
    IfcBuildingStorey => "IFCBUILDINGSTOREY",
    IfcSpace => "IFCSPACE",

    // Building elements
    IfcElement => "IFCELEMENT",
    IfcBuildingElement => "IFCBUILDINGELEMENT",
    IfcWall => "IFCWALL",
    IfcWallStandardCase => "IFCWALLSTANDARDCASE",
    IfcSlab => "IFCSLAB",
    IfcBeam => "IFCBEAM",
    IfcColumn => "IFCCOLUMN",
    IfcDoor => "IFCDOOR",
    IfcWindow => "IFCWINDOW",
    IfcBuildingElementProxy => "IFCBUILDINGELEMENTPROXY",

    // Type objects
    IfcTypeObject => "IFCTYPEOBJECT",
    IfcTypeProduct => "IFCTYPEPRODUCT",
    IfcElementType => "IFCELEMENTTYPE",
    IfcWallType => "IFCWALLTYPE",
    IfcSlabType => "IFCSLABTYPE",

    // Properties and quantities
    IfcPropertyDefinition => "IFCPROPERTYDEFINITION",
    IfcPropertySetDefinition => "IFCPROPERTYSETDEFINITION",
    IfcPropertySet => "IFCPROPERTYSET",
    IfcElementQuantity => "IFCELEMENTQUANTITY",
    IfcProperty => "IFCPROPERTY",
    IfcSimpleProperty => "IFCSIMPLEPROPERTY",
    IfcPropertySingleValue => "IFCPROPERTYSINGLEVALUE",
    IfcPropertyEnumeratedValue => "IFCPROPERTYENUMERATEDVALUE",
    IfcPhysicalQuantity => "IFCPHYSICALQUANTITY",
    IfcPhysicalSimpleQuantity => "IFCPHYSICALSIMPLEQUANTITY",
    IfcQuantityLength => "IFCQUANTITYLENGTH",
    IfcQuantityArea => "IFCQUANTITYAREA",
    IfcQuantityVolume => "IFCQUANTITYVOLUME",

    // Relationships
    IfcRelationship => "IFCRELATIONSHIP",
    IfcRelDecomposes => "IFCRELDECOMPOSES",
    IfcRelAggregates => "IFCRELAGGREGATES",
    IfcRelNests => "IFCRELNESTS",
    IfcRelConnects => "IFCRELCONNECTS",
    IfcRelContainedInSpatialStructure => "IFCRELCONTAINEDINSPATIALSTRUCTURE",
    IfcRelDefines => "IFCRELDEFINES",
    IfcRelDefinesByProperties => "IFCRELDEFINESBYPROPERTIES",
    IfcRelDefinesByType => "IFCRELDEFINESBYTYPE",
    IfcRelAssociates => "IFCRELASSOCIATES",
    IfcRelAssociatesMaterial => "IFCRELASSOCIATESMATERIAL",

    // Materials
    IfcMaterial => "IFCMATERIAL",

    // Actors and ownership
    IfcOwnerHistory => "IFCOWNERHISTORY",
    IfcPerson => "IFCPERSON",
    IfcOrganization => "IFCORGANIZATION",
    IfcPersonAndOrganization => "IFCPERSONANDORGANIZATION",
    IfcApplication => "IFCAPPLICATION",

    // Placement and geometry resources
    IfcRepresentationItem => "IFCREPRESENTATIONITEM",
    IfcGeometricRepresentationItem => "IFCGEOMETRICREPRESENTATIONITEM",
    IfcCartesianPoint => "IFCCARTESIANPOINT",
    IfcDirection => "IFCDIRECTION",
    IfcPlacement => "IFCPLACEMENT",
    IfcAxis2Placement2D => "IFCAXIS2PLACEMENT2D",
    IfcAxis2Placement3D => "IFCAXIS2PLACEMENT3D",
    IfcObjectPlacement => "IFCOBJECTPLACEMENT",
    IfcLocalPlacement => "IFCLOCALPLACEMENT",
    IfcPolyline => "IFCPOLYLINE",
    IfcProfileDef => "IFCPROFILEDEF",
    IfcRectangleProfileDef => "IFCRECTANGLEPROFILEDEF",
    IfcExtrudedAreaSolid => "IFCEXTRUDEDAREASOLID",

    // Representations and contexts
    IfcRepresentationContext => "IFCREPRESENTATIONCONTEXT",
    IfcGeometricRepresentationContext => "IFCGEOMETRICREPRESENTATIONCONTEXT",
    IfcGeometricRepresentationSubContext => "IFCGEOMETRICREPRESENTATIONSUBCONTEXT",
    IfcRepresentation => "IFCREPRESENTATION",
    IfcShapeRepresentation => "IFCSHAPEREPRESENTATION",
    IfcProductRepresentation => "IFCPRODUCTREPRESENTATION",
    IfcProductDefinitionShape => "IFCPRODUCTDEFINITIONSHAPE",

    // Coordinate reference
    IfcCoordinateReferenceSystem => "IFCCOORDINATEREFERENCESYSTEM",
    IfcProjectedCrs => "IFCPROJECTEDCRS",
    IfcCoordinateOperation => "IFCCOORDINATEOPERATION",
    IfcMapConversion => "IFCMAPCONVERSION",

    // Units
    IfcNamedUnit => "IFCNAMEDUNIT",
    IfcSIUnit => "IFCSIUNIT",
    IfcConversionBasedUnit => "IFCCONVERSIONBASEDUNIT",
    IfcMeasureWithUnit => "IFCMEASUREWITHUNIT",
    IfcDimensionalExponents => "IFCDIMENSIONALEXPONENTS",
    IfcUnitAssignment => "IFCUNITASSIGNMENT",
}

impl FromStr for IfcType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Default for IfcType {
    fn default() -> Self {
        IfcType::Unknown(String::new())
    }
}

impl fmt::Display for IfcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decoded attribute value
///
/// Represents any value that can appear in an IFC entity's attribute list.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Null value ($)
    #[default]
    Null,
    /// Derived value (*)
    Derived,
    /// Entity reference (#123)
    EntityRef(EntityId),
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Enumeration value (.VALUE.)
    Enum(String),
    /// List of values
    List(Vec<AttributeValue>),
    /// Typed value like IFCLABEL('text')
    TypedValue(String, Vec<AttributeValue>),
}

impl AttributeValue {
    /// Build an enumeration value
    pub fn enumeration(value: impl Into<String>) -> Self {
        AttributeValue::Enum(value.into())
    }

    /// Build a typed value like IFCLABEL('text')
    pub fn typed(type_name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        AttributeValue::TypedValue(type_name.into(), vec![value.into()])
    }

    /// Build a list of entity references
    pub fn refs(ids: impl IntoIterator<Item = EntityId>) -> Self {
        AttributeValue::List(ids.into_iter().map(AttributeValue::EntityRef).collect())
    }

    /// Try to get as entity reference
    pub fn as_entity_ref(&self) -> Option<EntityId> {
        match self {
            AttributeValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::TypedValue(_, args) if !args.is_empty() => args[0].as_string(),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::TypedValue(_, args) if !args.is_empty() => args[0].as_float(),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as enum string
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            AttributeValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as list
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(list) => Some(list),
            _ => None,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// All entity references held by this value, nested lists included
    pub fn entity_refs(&self) -> Vec<EntityId> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs(&self, refs: &mut Vec<EntityId>) {
        match self {
            AttributeValue::EntityRef(id) => refs.push(*id),
            AttributeValue::List(items) | AttributeValue::TypedValue(_, items) => {
                for item in items {
                    item.collect_refs(refs);
                }
            }
            _ => {}
        }
    }

    /// Rewrite every entity reference through `f`
    ///
    /// A reference mapped to `None` becomes `Null` when it stands alone and is
    /// removed when it is a list member. Lists left empty by the rewrite
    /// collapse to `Null`; lists that were empty before stay as they are.
    pub fn try_map_refs<E>(
        &self,
        f: &mut impl FnMut(EntityId) -> Result<Option<EntityId>, E>,
    ) -> Result<AttributeValue, E> {
        Ok(match self {
            AttributeValue::EntityRef(id) => match f(*id)? {
                Some(mapped) => AttributeValue::EntityRef(mapped),
                None => AttributeValue::Null,
            },
            AttributeValue::List(items) => {
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    let value = item.try_map_refs(f)?;
                    let dropped = value.is_null() && !item.is_null();
                    if !dropped {
                        mapped.push(value);
                    }
                }
                if mapped.is_empty() && !items.is_empty() {
                    AttributeValue::Null
                } else {
                    AttributeValue::List(mapped)
                }
            }
            AttributeValue::TypedValue(name, args) => {
                let mut mapped = Vec::with_capacity(args.len());
                for arg in args {
                    mapped.push(arg.try_map_refs(f)?);
                }
                AttributeValue::TypedValue(name.clone(), mapped)
            }
            other => other.clone(),
        })
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<EntityId> for AttributeValue {
    fn from(value: EntityId) -> Self {
        AttributeValue::EntityRef(value)
    }
}

impl From<Vec<EntityId>> for AttributeValue {
    fn from(value: Vec<EntityId>) -> Self {
        AttributeValue::refs(value)
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(value: Vec<f64>) -> Self {
        AttributeValue::List(value.into_iter().map(AttributeValue::Float).collect())
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// Decoded IFC entity
///
/// Represents a fully decoded IFC entity with its ID, type, and attribute values.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEntity {
    /// Entity ID
    pub id: EntityId,
    /// Entity type
    pub ifc_type: IfcType,
    /// Attribute values in order
    pub attributes: Vec<AttributeValue>,
}

impl DecodedEntity {
    pub fn new(id: EntityId, ifc_type: IfcType, attributes: Vec<AttributeValue>) -> Self {
        Self {
            id,
            ifc_type,
            attributes,
        }
    }

    /// Get attribute at index
    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }

    /// Get entity reference at index
    pub fn get_ref(&self, index: usize) -> Option<EntityId> {
        self.get(index).and_then(|v| v.as_entity_ref())
    }

    /// Get string at index
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_string())
    }

    /// Get enum value at index
    pub fn get_enum(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_enum())
    }

    /// Get float at index
    pub fn get_float(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_float())
    }

    /// Get list of entity references at index
    pub fn get_refs(&self, index: usize) -> Option<Vec<EntityId>> {
        self.get(index)
            .and_then(|v| v.as_list())
            .map(|list| list.iter().filter_map(|v| v.as_entity_ref()).collect())
    }
}

/// Numeric model factors carried from source to target stores
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelFactors {
    /// Plane angle unit to radians
    pub angle_to_radians: f64,
    /// Length unit to metres
    pub length_to_metres: f64,
    /// Geometric precision in model length units
    pub precision: f64,
}

impl Default for ModelFactors {
    fn default() -> Self {
        Self {
            angle_to_radians: 1.0,
            length_to_metres: 1.0,
            precision: 1e-5,
        }
    }
}

impl ModelFactors {
    pub fn new(angle_to_radians: f64, length_to_metres: f64, precision: f64) -> Self {
        Self {
            angle_to_radians,
            length_to_metres,
            precision,
        }
    }
}

/// Model metadata (header information)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// IFC schema version (e.g., "IFC2X3", "IFC4", "IFC4X3")
    pub schema_version: String,
    /// Originating system (CAD application)
    pub originating_system: Option<String>,
    /// File name
    pub file_name: Option<String>,
    /// Author
    pub author: Option<String>,
    /// Organization
    pub organization: Option<String>,
    /// Timestamp
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse_is_case_insensitive() {
        assert_eq!(IfcType::parse("IfcPropertySet"), IfcType::IfcPropertySet);
        assert_eq!(
            IfcType::parse("IFCRELAGGREGATES").name(),
            "IFCRELAGGREGATES"
        );
        assert_eq!(
            IfcType::parse("IfcFooBar"),
            IfcType::Unknown("IFCFOOBAR".to_string())
        );
    }

    #[test]
    fn test_entity_refs_recurse_into_lists() {
        let value = AttributeValue::List(vec![
            AttributeValue::EntityRef(EntityId(1)),
            AttributeValue::List(vec![AttributeValue::EntityRef(EntityId(2))]),
            AttributeValue::Float(1.0),
        ]);
        assert_eq!(value.entity_refs(), vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn test_map_refs_drops_members_and_collapses_empty_lists() {
        let value = AttributeValue::refs([EntityId(1), EntityId(2)]);
        let mapped = value
            .try_map_refs::<()>(&mut |id| Ok((id.0 == 2).then_some(EntityId(20))))
            .unwrap();
        assert_eq!(mapped, AttributeValue::refs([EntityId(20)]));

        let gone = value.try_map_refs::<()>(&mut |_| Ok(None)).unwrap();
        assert!(gone.is_null());

        let empty = AttributeValue::List(Vec::new());
        assert_eq!(
            empty.try_map_refs::<()>(&mut |_| Ok(None)).unwrap(),
            AttributeValue::List(Vec::new())
        );
    }

    #[test]
    fn test_single_ref_to_none_becomes_null() {
        let value = AttributeValue::EntityRef(EntityId(7));
        let mapped = value.try_map_refs::<()>(&mut |_| Ok(None)).unwrap();
        assert!(mapped.is_null());
    }

    #[test]
    fn test_instance_handle_display() {
        let handle = InstanceHandle::new(ModelId(3), EntityId(12));
        assert_eq!(handle.to_string(), "#12@m3");
    }
}
