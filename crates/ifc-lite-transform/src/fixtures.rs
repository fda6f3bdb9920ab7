// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared test models and a closure-driven policy

use crate::{
    ModelTransform, PassDecision, PhaseOutcome, ProgressToken, Result, TransformConfig,
    TransformPackage,
};
use ifc_lite_model::{
    AttributeValue, DecodedEntity, EntityId, IfcModel, PropertyDescriptor, SchemaRegistry,
};
use ifc_lite_store::{derive_factors, MemoryModel, ModelHandle};
use std::sync::Arc;

pub fn empty_model() -> MemoryModel {
    MemoryModel::new(SchemaRegistry::ifc4())
}

fn guid(n: u32) -> String {
    format!("0{:021}", n)
}

/// IfcRelAggregates from `parent` to `children`
pub fn aggregate(
    m: &mut MemoryModel,
    parent: EntityId,
    children: &[EntityId],
) -> ifc_lite_model::Result<EntityId> {
    let n = m.len() as u32;
    m.build("IfcRelAggregates")
        .with("GlobalId", guid(n))
        .with("RelatingObject", parent)
        .with("RelatedObjects", children.to_vec())
        .finish()
}

/// IfcRelContainedInSpatialStructure from `structure` to `elements`
pub fn contain(
    m: &mut MemoryModel,
    structure: EntityId,
    elements: &[EntityId],
) -> ifc_lite_model::Result<EntityId> {
    let n = m.len() as u32;
    m.build("IfcRelContainedInSpatialStructure")
        .with("GlobalId", guid(n))
        .with("RelatedElements", elements.to_vec())
        .with("RelatingStructure", structure)
        .finish()
}

/// Property set with one single-value property
pub fn property_set(
    m: &mut MemoryModel,
    name: &str,
    property: &str,
) -> ifc_lite_model::Result<EntityId> {
    let value = m
        .build("IfcPropertySingleValue")
        .with("Name", property)
        .with("NominalValue", AttributeValue::typed("IFCLABEL", "x"))
        .finish()?;
    let n = m.len() as u32;
    m.build("IfcPropertySet")
        .with("GlobalId", guid(n))
        .with("Name", name)
        .with("HasProperties", vec![value])
        .finish()
}

/// IfcRelDefinesByProperties from `pset` to `objects`
pub fn define(
    m: &mut MemoryModel,
    pset: EntityId,
    objects: &[EntityId],
) -> ifc_lite_model::Result<EntityId> {
    let n = m.len() as u32;
    m.build("IfcRelDefinesByProperties")
        .with("GlobalId", guid(n))
        .with("RelatedObjects", objects.to_vec())
        .with("RelatingPropertyDefinition", pset)
        .finish()
}

/// One wall carrying four property sets named "A" and two named "B"
pub fn pset_model() -> MemoryModel {
    let mut model = empty_model();
    model
        .transact("psets", |m| {
            let wall = m
                .build("IfcWall")
                .with("GlobalId", guid(0))
                .with("Name", "Wall")
                .finish()?;
            for (i, name) in ["A", "B", "A", "A", "B", "A"].into_iter().enumerate() {
                let pset = property_set(m, name, &format!("Property{}", i))?;
                define(m, pset, &[wall])?;
            }
            Ok::<_, ifc_lite_model::ModelError>(())
        })
        .unwrap();
    model
}

/// Labels of the interesting entities of [`building_model`]
#[derive(Clone, Copy, Debug)]
pub struct BuildingIds {
    pub context: EntityId,
    pub project: EntityId,
    pub building: EntityId,
    pub storey_1: EntityId,
    pub storey_2: EntityId,
    pub wall_1: EntityId,
    pub wall_2: EntityId,
    pub slab: EntityId,
    pub wall_type: EntityId,
    pub wall_pset: EntityId,
}

/// Project > building > two storeys; two walls on the first storey, a slab on
/// the second; millimetre units, one model context with a body sub-context
pub fn building_model() -> (MemoryModel, BuildingIds) {
    let mut model = empty_model();
    let ids = model
        .transact("building", |m| {
            let length_unit = m
                .build("IfcSIUnit")
                .with("UnitType", AttributeValue::enumeration("LENGTHUNIT"))
                .with("Prefix", AttributeValue::enumeration("MILLI"))
                .with("Name", AttributeValue::enumeration("METRE"))
                .finish()?;
            let angle_unit = m
                .build("IfcSIUnit")
                .with("UnitType", AttributeValue::enumeration("PLANEANGLEUNIT"))
                .with("Name", AttributeValue::enumeration("RADIAN"))
                .finish()?;
            let units = m
                .build("IfcUnitAssignment")
                .with("Units", vec![length_unit, angle_unit])
                .finish()?;

            let origin = m
                .build("IfcCartesianPoint")
                .with("Coordinates", vec![1000.0, 2000.0, 0.0])
                .finish()?;
            let world = m
                .build("IfcAxis2Placement3D")
                .with("Location", origin)
                .finish()?;
            let context = m
                .build("IfcGeometricRepresentationContext")
                .with("ContextIdentifier", "Model")
                .with("ContextType", "Model")
                .with("CoordinateSpaceDimension", 3i64)
                .with("Precision", 1e-6)
                .with("WorldCoordinateSystem", world)
                .finish()?;
            m.build("IfcGeometricRepresentationSubContext")
                .with("ContextIdentifier", "Body")
                .with("ContextType", "Model")
                .with("ParentContext", context)
                .with("TargetView", AttributeValue::enumeration("MODEL_VIEW"))
                .finish()?;

            let project = m
                .build("IfcProject")
                .with("GlobalId", guid(1))
                .with("Name", "Project")
                .with("RepresentationContexts", vec![context])
                .with("UnitsInContext", units)
                .finish()?;

            let placement = m
                .build("IfcLocalPlacement")
                .with("RelativePlacement", world)
                .finish()?;
            let building = m
                .build("IfcBuilding")
                .with("GlobalId", guid(2))
                .with("Name", "Building")
                .with("ObjectPlacement", placement)
                .finish()?;
            let storey_1 = m
                .build("IfcBuildingStorey")
                .with("GlobalId", guid(3))
                .with("Name", "Level 1")
                .with("ObjectPlacement", placement)
                .with("Elevation", 0.0)
                .finish()?;
            let storey_2 = m
                .build("IfcBuildingStorey")
                .with("GlobalId", guid(4))
                .with("Name", "Level 2")
                .with("ObjectPlacement", placement)
                .with("Elevation", 3000.0)
                .finish()?;

            let wall_1 = m
                .build("IfcWall")
                .with("GlobalId", guid(5))
                .with("Name", "Wall 1")
                .with("ObjectPlacement", placement)
                .finish()?;
            let wall_2 = m
                .build("IfcWall")
                .with("GlobalId", guid(6))
                .with("Name", "Wall 2")
                .with("ObjectPlacement", placement)
                .finish()?;
            let slab = m
                .build("IfcSlab")
                .with("GlobalId", guid(7))
                .with("Name", "Slab")
                .with("ObjectPlacement", placement)
                .finish()?;

            aggregate(m, project, &[building])?;
            aggregate(m, building, &[storey_1, storey_2])?;
            contain(m, storey_1, &[wall_1, wall_2])?;
            contain(m, storey_2, &[slab])?;

            let wall_type = m
                .build("IfcWallType")
                .with("GlobalId", guid(8))
                .with("Name", "Basic Wall")
                .finish()?;
            m.build("IfcRelDefinesByType")
                .with("GlobalId", guid(9))
                .with("RelatedObjects", vec![wall_1, wall_2])
                .with("RelatingType", wall_type)
                .finish()?;

            let wall_pset = property_set(m, "Pset_WallCommon", "IsExternal")?;
            define(m, wall_pset, &[wall_1, wall_2])?;

            let factors = derive_factors(&*m);
            m.initialise_factors(factors)?;

            Ok::<_, ifc_lite_model::ModelError>(BuildingIds {
                context,
                project,
                building,
                storey_1,
                storey_2,
                wall_1,
                wall_2,
                slab,
                wall_type,
                wall_pset,
            })
        })
        .unwrap();
    (model, ids)
}

/// `n` local placements, each placed relative to the next, the last to the first
pub fn placement_cycle_model(n: usize) -> MemoryModel {
    let mut model = empty_model();
    model
        .transact("cycle", |m| {
            let placements = (0..n)
                .map(|_| m.create("IfcLocalPlacement"))
                .collect::<ifc_lite_model::Result<Vec<_>>>()?;
            for (i, placement) in placements.iter().enumerate() {
                let next = placements[(i + 1) % n];
                m.set(*placement, "PlacementRelTo", next)?;
            }
            Ok::<_, ifc_lite_model::ModelError>(())
        })
        .unwrap();
    model
}

// ============================================================================
// Closure policy
// ============================================================================

type Package = TransformPackage<()>;
type PassFn = Box<dyn Fn(&DecodedEntity, &mut Package) -> Result<PassDecision> + Send + Sync>;
type PropertyFn = Box<
    dyn Fn(&PropertyDescriptor, &DecodedEntity, &mut Package) -> Result<AttributeValue>
        + Send
        + Sync,
>;
type PreprocessFn = Box<dyn Fn(&mut Package) -> Result<PhaseOutcome> + Send + Sync>;

/// Policy assembled from closures
pub struct FnPolicy {
    config: TransformConfig,
    pass: PassFn,
    property: Option<PropertyFn>,
    preprocess: Option<PreprocessFn>,
}

impl FnPolicy {
    pub fn new<F>(pass: F) -> Self
    where
        F: Fn(&DecodedEntity, &mut Package) -> Result<PassDecision> + Send + Sync + 'static,
    {
        Self {
            config: TransformConfig::default(),
            pass: Box::new(pass),
            property: None,
            preprocess: None,
        }
    }

    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_property<F>(mut self, property: F) -> Self
    where
        F: Fn(&PropertyDescriptor, &DecodedEntity, &mut Package) -> Result<AttributeValue>
            + Send
            + Sync
            + 'static,
    {
        self.property = Some(Box::new(property));
        self
    }

    pub fn with_preprocess<F>(mut self, preprocess: F) -> Self
    where
        F: Fn(&mut Package) -> Result<PhaseOutcome> + Send + Sync + 'static,
    {
        self.preprocess = Some(Box::new(preprocess));
        self
    }
}

impl ModelTransform for FnPolicy {
    type State = ();

    fn name(&self) -> &str {
        "closure policy"
    }

    fn config(&self) -> &TransformConfig {
        &self.config
    }

    fn create_transform_package(
        &self,
        source: Arc<dyn IfcModel>,
        target: ModelHandle,
        progress: ProgressToken,
    ) -> Result<TransformPackage<()>> {
        Ok(TransformPackage::new(source, target, progress, self.config.log_filter, ()))
    }

    fn pass_instance(
        &self,
        entity: &DecodedEntity,
        package: &mut TransformPackage<()>,
    ) -> Result<PassDecision> {
        (self.pass)(entity, package)
    }

    fn property_transform(
        &self,
        descriptor: &PropertyDescriptor,
        host: &DecodedEntity,
        package: &mut TransformPackage<()>,
    ) -> Result<AttributeValue> {
        match &self.property {
            Some(property) => property(descriptor, host, package),
            None => Ok(crate::forward_property(descriptor, host, package)),
        }
    }

    fn do_preprocess_transform(&self, package: &mut TransformPackage<()>) -> Result<PhaseOutcome> {
        match &self.preprocess {
            Some(preprocess) => preprocess(package),
            None => Ok(PhaseOutcome::Proceed),
        }
    }
}
