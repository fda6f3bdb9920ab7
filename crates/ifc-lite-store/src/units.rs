// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model factor extraction from unit assignments and representation contexts

use ifc_lite_model::{AttributeValue, DecodedEntity, EntityResolver, IfcType, ModelFactors};

/// IFCPROJECT.UnitsInContext
const PROJECT_UNITS: usize = 8;
/// IFCNAMEDUNIT.UnitType
const UNIT_TYPE: usize = 1;
/// IFCGEOMETRICREPRESENTATIONCONTEXT.Precision
const CONTEXT_PRECISION: usize = 3;

/// Derive model factors from the project's units and the first geometric
/// representation context
///
/// Missing information falls back to [`ModelFactors::default`].
pub fn derive_factors(resolver: &dyn EntityResolver) -> ModelFactors {
    let mut factors = ModelFactors::default();

    for unit in project_units(resolver) {
        match unit.get_enum(UNIT_TYPE) {
            Some("LENGTHUNIT") => {
                if let Some(scale) = unit_scale(&unit, resolver, "METRE") {
                    factors.length_to_metres = scale;
                }
            }
            Some("PLANEANGLEUNIT") => {
                if let Some(scale) = unit_scale(&unit, resolver, "RADIAN") {
                    factors.angle_to_radians = scale;
                }
            }
            _ => {}
        }
    }

    let precision = resolver
        .entities_by_type(&IfcType::IfcGeometricRepresentationContext)
        .iter()
        .find_map(|ctx| ctx.get_float(CONTEXT_PRECISION));
    if let Some(precision) = precision.filter(|p| *p > 0.0) {
        factors.precision = precision;
    }

    factors
}

fn project_units(resolver: &dyn EntityResolver) -> Vec<std::sync::Arc<DecodedEntity>> {
    let projects = resolver.entities_by_type(&IfcType::IfcProject);
    let Some(project) = projects.first() else {
        return Vec::new();
    };
    let Some(assignment) = project
        .get_ref(PROJECT_UNITS)
        .and_then(|id| resolver.get(id))
    else {
        return Vec::new();
    };
    assignment
        .get(0)
        .map(|units| resolver.resolve_ref_list(units))
        .unwrap_or_default()
}

/// Scale of an IFCSIUNIT or IFCCONVERSIONBASEDUNIT relative to the SI base
fn unit_scale(unit: &DecodedEntity, resolver: &dyn EntityResolver, base: &str) -> Option<f64> {
    match unit.ifc_type {
        IfcType::IfcSIUnit => {
            // IFCSIUNIT(*, UnitType, Prefix, Name)
            if unit.get_enum(3)? != base {
                return None;
            }
            Some(unit.get_enum(2).map(prefix_scale).unwrap_or(1.0))
        }
        IfcType::IfcConversionBasedUnit => {
            // IFCCONVERSIONBASEDUNIT(Dimensions, UnitType, Name, ConversionFactor)
            let factor = resolver.get(unit.get_ref(3)?)?;
            if factor.ifc_type != IfcType::IfcMeasureWithUnit {
                return None;
            }
            let value = measure_value(factor.get(0)?)?;
            let base_scale = factor
                .get_ref(1)
                .and_then(|id| resolver.get(id))
                .and_then(|u| unit_scale(&u, resolver, base))
                .unwrap_or(1.0);
            Some(value * base_scale)
        }
        _ => None,
    }
}

/// Scale of an SI prefix (`MILLI` is 1e-3), 1 for unknown or empty prefixes
pub fn prefix_scale(prefix: &str) -> f64 {
    match prefix {
        "EXA" => 1e18,
        "PETA" => 1e15,
        "TERA" => 1e12,
        "GIGA" => 1e9,
        "MEGA" => 1e6,
        "KILO" => 1e3,
        "HECTO" => 1e2,
        "DECA" => 1e1,
        "DECI" => 1e-1,
        "CENTI" => 1e-2,
        "MILLI" => 1e-3,
        "MICRO" => 1e-6,
        "NANO" => 1e-9,
        "PICO" => 1e-12,
        "FEMTO" => 1e-15,
        "ATTO" => 1e-18,
        _ => 1.0,
    }
}

fn measure_value(attr: &AttributeValue) -> Option<f64> {
    attr.as_float()
}
