// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC4 entity declarations
//!
//! A subset of IFC4 ADD2 TC1 large enough for product structure, property
//! sets, placements, representation contexts, coordinate operations and
//! units. Attribute order follows the EXPRESS schema.

use crate::schema::EntityDef;

pub fn definitions() -> Vec<EntityDef> {
    let mut defs = Vec::with_capacity(96);
    defs.extend(rooted());
    defs.extend(spatial());
    defs.extend(elements());
    defs.extend(type_objects());
    defs.extend(properties());
    defs.extend(relationships());
    defs.extend(actors());
    defs.extend(geometry());
    defs.extend(representations());
    defs.extend(georeferencing());
    defs.extend(units());
    defs
}

fn rooted() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcRoot", None)
            .data("GlobalId")
            .entity("OwnerHistory")
            .data("Name")
            .data("Description"),
        EntityDef::abstract_type("IfcObjectDefinition", Some("IfcRoot"))
            .inverse_single("Nests", "IfcRelNests", "RelatedObjects")
            .inverse_set("IsNestedBy", "IfcRelNests", "RelatingObject")
            .inverse_set("IsDecomposedBy", "IfcRelAggregates", "RelatingObject")
            .inverse_single("Decomposes", "IfcRelAggregates", "RelatedObjects")
            .inverse_set("HasAssociations", "IfcRelAssociates", "RelatedObjects"),
        EntityDef::abstract_type("IfcObject", Some("IfcObjectDefinition"))
            .data("ObjectType")
            .inverse_single("IsTypedBy", "IfcRelDefinesByType", "RelatedObjects")
            .inverse_set("IsDefinedBy", "IfcRelDefinesByProperties", "RelatedObjects"),
        EntityDef::abstract_type("IfcProduct", Some("IfcObject"))
            .entity("ObjectPlacement")
            .entity("Representation"),
        EntityDef::abstract_type("IfcContext", Some("IfcObjectDefinition"))
            .data("ObjectType")
            .data("LongName")
            .data("Phase")
            .entities("RepresentationContexts")
            .entity("UnitsInContext")
            .inverse_set("IsDefinedBy", "IfcRelDefinesByProperties", "RelatedObjects"),
        EntityDef::concrete("IfcProject", Some("IfcContext")),
    ]
}

fn spatial() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcSpatialElement", Some("IfcProduct"))
            .data("LongName")
            .inverse_set(
                "ContainsElements",
                "IfcRelContainedInSpatialStructure",
                "RelatingStructure",
            ),
        EntityDef::abstract_type("IfcSpatialStructureElement", Some("IfcSpatialElement"))
            .data("CompositionType"),
        EntityDef::concrete("IfcSite", Some("IfcSpatialStructureElement"))
            .data("RefLatitude")
            .data("RefLongitude")
            .data("RefElevation")
            .data("LandTitleNumber")
            .entity("SiteAddress"),
        EntityDef::concrete("IfcBuilding", Some("IfcSpatialStructureElement"))
            .data("ElevationOfRefHeight")
            .data("ElevationOfTerrain")
            .entity("BuildingAddress"),
        EntityDef::concrete("IfcBuildingStorey", Some("IfcSpatialStructureElement"))
            .data("Elevation"),
        EntityDef::concrete("IfcSpace", Some("IfcSpatialStructureElement"))
            .data("PredefinedType")
            .data("ElevationWithFlooring"),
    ]
}

fn elements() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcElement", Some("IfcProduct"))
            .data("Tag")
            .inverse_single(
                "ContainedInStructure",
                "IfcRelContainedInSpatialStructure",
                "RelatedElements",
            ),
        EntityDef::abstract_type("IfcBuildingElement", Some("IfcElement")),
        EntityDef::concrete("IfcWall", Some("IfcBuildingElement")).data("PredefinedType"),
        EntityDef::concrete("IfcWallStandardCase", Some("IfcWall")),
        EntityDef::concrete("IfcSlab", Some("IfcBuildingElement")).data("PredefinedType"),
        EntityDef::concrete("IfcBeam", Some("IfcBuildingElement")).data("PredefinedType"),
        EntityDef::concrete("IfcColumn", Some("IfcBuildingElement")).data("PredefinedType"),
        EntityDef::concrete("IfcDoor", Some("IfcBuildingElement"))
            .data("OverallHeight")
            .data("OverallWidth")
            .data("PredefinedType")
            .data("OperationType")
            .data("UserDefinedOperationType"),
        EntityDef::concrete("IfcWindow", Some("IfcBuildingElement"))
            .data("OverallHeight")
            .data("OverallWidth")
            .data("PredefinedType")
            .data("PartitioningType")
            .data("UserDefinedPartitioningType"),
        EntityDef::concrete("IfcBuildingElementProxy", Some("IfcBuildingElement"))
            .data("PredefinedType"),
    ]
}

fn type_objects() -> Vec<EntityDef> {
    vec![
        EntityDef::concrete("IfcTypeObject", Some("IfcObjectDefinition"))
            .data("ApplicableOccurrence")
            .entities("HasPropertySets")
            .inverse_set("Types", "IfcRelDefinesByType", "RelatingType"),
        EntityDef::concrete("IfcTypeProduct", Some("IfcTypeObject"))
            .entities("RepresentationMaps")
            .data("Tag"),
        EntityDef::abstract_type("IfcElementType", Some("IfcTypeProduct")).data("ElementType"),
        EntityDef::abstract_type("IfcBuildingElementType", Some("IfcElementType")),
        EntityDef::concrete("IfcWallType", Some("IfcBuildingElementType")).data("PredefinedType"),
        EntityDef::concrete("IfcSlabType", Some("IfcBuildingElementType")).data("PredefinedType"),
    ]
}

fn properties() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcPropertyDefinition", Some("IfcRoot"))
            .inverse_set("HasAssociations", "IfcRelAssociates", "RelatedObjects"),
        EntityDef::abstract_type("IfcPropertySetDefinition", Some("IfcPropertyDefinition"))
            .inverse_set("DefinesType", "IfcTypeObject", "HasPropertySets")
            .inverse_set(
                "DefinesOccurrence",
                "IfcRelDefinesByProperties",
                "RelatingPropertyDefinition",
            ),
        EntityDef::concrete("IfcPropertySet", Some("IfcPropertySetDefinition"))
            .entities("HasProperties"),
        EntityDef::concrete("IfcElementQuantity", Some("IfcPropertySetDefinition"))
            .data("MethodOfMeasurement")
            .entities("Quantities"),
        EntityDef::abstract_type("IfcPropertyAbstraction", None),
        EntityDef::abstract_type("IfcProperty", Some("IfcPropertyAbstraction"))
            .data("Name")
            .data("Description")
            .inverse_set("PartOfPset", "IfcPropertySet", "HasProperties"),
        EntityDef::abstract_type("IfcSimpleProperty", Some("IfcProperty")),
        EntityDef::concrete("IfcPropertySingleValue", Some("IfcSimpleProperty"))
            .data("NominalValue")
            .entity("Unit"),
        EntityDef::concrete("IfcPropertyEnumeratedValue", Some("IfcSimpleProperty"))
            .data("EnumerationValues")
            .entity("EnumerationReference"),
        EntityDef::abstract_type("IfcPhysicalQuantity", None)
            .data("Name")
            .data("Description")
            .inverse_set("PartOfSet", "IfcElementQuantity", "Quantities"),
        EntityDef::abstract_type("IfcPhysicalSimpleQuantity", Some("IfcPhysicalQuantity"))
            .entity("Unit"),
        EntityDef::concrete("IfcQuantityLength", Some("IfcPhysicalSimpleQuantity"))
            .data("LengthValue")
            .data("Formula"),
        EntityDef::concrete("IfcQuantityArea", Some("IfcPhysicalSimpleQuantity"))
            .data("AreaValue")
            .data("Formula"),
        EntityDef::concrete("IfcQuantityVolume", Some("IfcPhysicalSimpleQuantity"))
            .data("VolumeValue")
            .data("Formula"),
    ]
}

fn relationships() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcRelationship", Some("IfcRoot")),
        EntityDef::abstract_type("IfcRelDecomposes", Some("IfcRelationship")),
        EntityDef::concrete("IfcRelAggregates", Some("IfcRelDecomposes"))
            .entity("RelatingObject")
            .entities("RelatedObjects"),
        EntityDef::concrete("IfcRelNests", Some("IfcRelDecomposes"))
            .entity("RelatingObject")
            .entities("RelatedObjects"),
        EntityDef::abstract_type("IfcRelConnects", Some("IfcRelationship")),
        EntityDef::concrete("IfcRelContainedInSpatialStructure", Some("IfcRelConnects"))
            .entities("RelatedElements")
            .entity("RelatingStructure"),
        EntityDef::abstract_type("IfcRelDefines", Some("IfcRelationship")),
        EntityDef::concrete("IfcRelDefinesByProperties", Some("IfcRelDefines"))
            .entities("RelatedObjects")
            .entity("RelatingPropertyDefinition"),
        EntityDef::concrete("IfcRelDefinesByType", Some("IfcRelDefines"))
            .entities("RelatedObjects")
            .entity("RelatingType"),
        EntityDef::abstract_type("IfcRelAssociates", Some("IfcRelationship"))
            .entities("RelatedObjects"),
        EntityDef::concrete("IfcRelAssociatesMaterial", Some("IfcRelAssociates"))
            .entity("RelatingMaterial"),
        EntityDef::concrete("IfcMaterial", None)
            .data("Name")
            .data("Description")
            .data("Category"),
    ]
}

fn actors() -> Vec<EntityDef> {
    vec![
        EntityDef::concrete("IfcOwnerHistory", None)
            .entity("OwningUser")
            .entity("OwningApplication")
            .data("State")
            .data("ChangeAction")
            .data("LastModifiedDate")
            .entity("LastModifyingUser")
            .entity("LastModifyingApplication")
            .data("CreationDate"),
        EntityDef::concrete("IfcPerson", None)
            .data("Identification")
            .data("FamilyName")
            .data("GivenName")
            .data("MiddleNames")
            .data("PrefixTitles")
            .data("SuffixTitles")
            .entities("Roles")
            .entities("Addresses"),
        EntityDef::concrete("IfcOrganization", None)
            .data("Identification")
            .data("Name")
            .data("Description")
            .entities("Roles")
            .entities("Addresses"),
        EntityDef::concrete("IfcPersonAndOrganization", None)
            .entity("ThePerson")
            .entity("TheOrganization")
            .entities("Roles"),
        EntityDef::concrete("IfcApplication", None)
            .entity("ApplicationDeveloper")
            .data("Version")
            .data("ApplicationFullName")
            .data("ApplicationIdentifier"),
    ]
}

fn geometry() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcRepresentationItem", None),
        EntityDef::abstract_type(
            "IfcGeometricRepresentationItem",
            Some("IfcRepresentationItem"),
        ),
        EntityDef::concrete("IfcCartesianPoint", Some("IfcGeometricRepresentationItem"))
            .data("Coordinates"),
        EntityDef::concrete("IfcDirection", Some("IfcGeometricRepresentationItem"))
            .data("DirectionRatios"),
        EntityDef::abstract_type("IfcPlacement", Some("IfcGeometricRepresentationItem"))
            .entity("Location"),
        EntityDef::concrete("IfcAxis2Placement2D", Some("IfcPlacement")).entity("RefDirection"),
        EntityDef::concrete("IfcAxis2Placement3D", Some("IfcPlacement"))
            .entity("Axis")
            .entity("RefDirection"),
        EntityDef::concrete("IfcPolyline", Some("IfcGeometricRepresentationItem"))
            .entities("Points"),
        EntityDef::abstract_type("IfcSolidModel", Some("IfcGeometricRepresentationItem")),
        EntityDef::abstract_type("IfcSweptAreaSolid", Some("IfcSolidModel"))
            .entity("SweptArea")
            .entity("Position"),
        EntityDef::concrete("IfcExtrudedAreaSolid", Some("IfcSweptAreaSolid"))
            .entity("ExtrudedDirection")
            .data("Depth"),
        EntityDef::abstract_type("IfcProfileDef", None)
            .data("ProfileType")
            .data("ProfileName"),
        EntityDef::abstract_type("IfcParameterizedProfileDef", Some("IfcProfileDef"))
            .entity("Position"),
        EntityDef::concrete("IfcRectangleProfileDef", Some("IfcParameterizedProfileDef"))
            .data("XDim")
            .data("YDim"),
        EntityDef::abstract_type("IfcObjectPlacement", None)
            .inverse_set("PlacesObject", "IfcProduct", "ObjectPlacement")
            .inverse_set(
                "ReferencedByPlacements",
                "IfcLocalPlacement",
                "PlacementRelTo",
            ),
        EntityDef::concrete("IfcLocalPlacement", Some("IfcObjectPlacement"))
            .entity("PlacementRelTo")
            .entity("RelativePlacement"),
    ]
}

fn representations() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcRepresentationContext", None)
            .data("ContextIdentifier")
            .data("ContextType")
            .inverse_set(
                "RepresentationsInContext",
                "IfcRepresentation",
                "ContextOfItems",
            ),
        EntityDef::concrete(
            "IfcGeometricRepresentationContext",
            Some("IfcRepresentationContext"),
        )
        .data("CoordinateSpaceDimension")
        .data("Precision")
        .entity("WorldCoordinateSystem")
        .entity("TrueNorth")
        .inverse_set(
            "HasSubContexts",
            "IfcGeometricRepresentationSubContext",
            "ParentContext",
        )
        .inverse_set(
            "HasCoordinateOperation",
            "IfcCoordinateOperation",
            "SourceCRS",
        ),
        EntityDef::concrete(
            "IfcGeometricRepresentationSubContext",
            Some("IfcGeometricRepresentationContext"),
        )
        .entity("ParentContext")
        .data("TargetScale")
        .data("TargetView")
        .data("UserDefinedTargetView"),
        EntityDef::abstract_type("IfcRepresentation", None)
            .entity("ContextOfItems")
            .data("RepresentationIdentifier")
            .data("RepresentationType")
            .entities("Items"),
        EntityDef::abstract_type("IfcShapeModel", Some("IfcRepresentation")),
        EntityDef::concrete("IfcShapeRepresentation", Some("IfcShapeModel")),
        EntityDef::concrete("IfcProductRepresentation", None)
            .data("Name")
            .data("Description")
            .entities("Representations"),
        EntityDef::concrete(
            "IfcProductDefinitionShape",
            Some("IfcProductRepresentation"),
        )
            .inverse_set("ShapeOfProduct", "IfcProduct", "Representation"),
    ]
}

fn georeferencing() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcCoordinateReferenceSystem", None)
            .data("Name")
            .data("Description")
            .data("GeodeticDatum")
            .data("VerticalDatum")
            .inverse_set(
                "HasCoordinateOperation",
                "IfcCoordinateOperation",
                "SourceCRS",
            ),
        EntityDef::concrete("IfcProjectedCRS", Some("IfcCoordinateReferenceSystem"))
            .data("MapProjection")
            .data("MapZone")
            .entity("MapUnit"),
        EntityDef::abstract_type("IfcCoordinateOperation", None)
            .entity("SourceCRS")
            .entity("TargetCRS"),
        EntityDef::concrete("IfcMapConversion", Some("IfcCoordinateOperation"))
            .data("Eastings")
            .data("Northings")
            .data("OrthogonalHeight")
            .data("XAxisAbscissa")
            .data("XAxisOrdinate")
            .data("Scale"),
    ]
}

fn units() -> Vec<EntityDef> {
    vec![
        EntityDef::abstract_type("IfcNamedUnit", None)
            .entity("Dimensions")
            .data("UnitType"),
        EntityDef::concrete("IfcSIUnit", Some("IfcNamedUnit"))
            .data("Prefix")
            .data("Name"),
        EntityDef::concrete("IfcConversionBasedUnit", Some("IfcNamedUnit"))
            .data("Name")
            .entity("ConversionFactor"),
        EntityDef::concrete("IfcMeasureWithUnit", None)
            .data("ValueComponent")
            .entity("UnitComponent"),
        EntityDef::concrete("IfcDimensionalExponents", None)
            .data("LengthExponent")
            .data("MassExponent")
            .data("TimeExponent")
            .data("ElectricCurrentExponent")
            .data("ThermodynamicTemperatureExponent")
            .data("AmountOfSubstanceExponent")
            .data("LuminousIntensityExponent"),
        EntityDef::concrete("IfcUnitAssignment", None).entities("Units"),
    ]
}
