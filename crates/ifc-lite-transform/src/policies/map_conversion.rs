// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Georeferencing through IfcMapConversion
//!
//! Existing map conversions and projected CRS are replaced. The new CRS is
//! expressed in an SI length unit; every matching model context receives one
//! conversion into it.

use super::ids_of_kind;
use crate::{
    ModelTransform, PassDecision, PhaseOutcome, ProgressToken, Result, TransformAction,
    TransformConfig, TransformError, TransformPackage,
};
use ifc_lite_model::{
    AttributeValue, DecodedEntity, EntityId, EntityResolver, IfcModel, IfcType, SchemaRegistry,
};
use ifc_lite_store::{prefix_scale, MemoryModel, ModelHandle};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Attribute positions read and rewritten on representation contexts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ContextLayout {
    identifier: usize,
    context_type: usize,
    world_coordinate_system: usize,
    location: usize,
    coordinates: usize,
}

impl ContextLayout {
    fn resolve(schema: &SchemaRegistry) -> Result<Self> {
        let index = |type_name: &str, name: &str| -> Result<usize> {
            Ok(schema.property(type_name, name)?.index)
        };
        Ok(Self {
            identifier: index("IfcRepresentationContext", "ContextIdentifier")?,
            context_type: index("IfcRepresentationContext", "ContextType")?,
            world_coordinate_system: index(
                "IfcGeometricRepresentationContext",
                "WorldCoordinateSystem",
            )?,
            location: index("IfcPlacement", "Location")?,
            coordinates: index("IfcCartesianPoint", "Coordinates")?,
        })
    }
}

/// Target CRS and conversion parameters
///
/// Every field is optional so partial documents can be layered with
/// [`MapConversionPreferences::merge`]. A run needs at least the CRS name
/// and the geodetic datum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConversionPreferences {
    pub crs_name: Option<String>,
    pub crs_description: Option<String>,
    pub geodetic_datum: Option<String>,
    pub vertical_datum: Option<String>,
    pub map_projection: Option<String>,
    pub map_zone: Option<String>,
    /// SI prefix of the map unit (metre without)
    pub map_unit_prefix: Option<String>,
    pub eastings: Option<f64>,
    pub northings: Option<f64>,
    pub orthogonal_height: Option<f64>,
    pub x_axis_abscissa: Option<f64>,
    pub x_axis_ordinate: Option<f64>,
    pub scale: Option<f64>,
    /// Only contexts with this identifier (case-insensitive)
    pub context_identifier: Option<String>,
    /// Only contexts of this type (case-insensitive)
    pub context_type: Option<String>,
    /// Shift each context's world origin into the conversion offset
    pub move_origin_to_offset: Option<bool>,
}

impl MapConversionPreferences {
    pub fn new(crs_name: &str, geodetic_datum: &str) -> Self {
        Self {
            crs_name: Some(crs_name.to_string()),
            geodetic_datum: Some(geodetic_datum.to_string()),
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, eastings: f64, northings: f64, orthogonal_height: f64) -> Self {
        self.eastings = Some(eastings);
        self.northings = Some(northings);
        self.orthogonal_height = Some(orthogonal_height);
        self
    }

    pub fn with_context_filter(
        mut self,
        identifier: Option<&str>,
        context_type: Option<&str>,
    ) -> Self {
        self.context_identifier = identifier.map(str::to_string);
        self.context_type = context_type.map(str::to_string);
        self
    }

    pub fn with_map_unit_prefix(mut self, prefix: &str) -> Self {
        self.map_unit_prefix = Some(prefix.to_uppercase());
        self
    }

    pub fn with_origin_move(mut self, enabled: bool) -> Self {
        self.move_origin_to_offset = Some(enabled);
        self
    }

    /// Layer `other` on top: its set fields win
    pub fn merge(self, other: MapConversionPreferences) -> Self {
        Self {
            crs_name: other.crs_name.or(self.crs_name),
            crs_description: other.crs_description.or(self.crs_description),
            geodetic_datum: other.geodetic_datum.or(self.geodetic_datum),
            vertical_datum: other.vertical_datum.or(self.vertical_datum),
            map_projection: other.map_projection.or(self.map_projection),
            map_zone: other.map_zone.or(self.map_zone),
            map_unit_prefix: other.map_unit_prefix.or(self.map_unit_prefix),
            eastings: other.eastings.or(self.eastings),
            northings: other.northings.or(self.northings),
            orthogonal_height: other.orthogonal_height.or(self.orthogonal_height),
            x_axis_abscissa: other.x_axis_abscissa.or(self.x_axis_abscissa),
            x_axis_ordinate: other.x_axis_ordinate.or(self.x_axis_ordinate),
            scale: other.scale.or(self.scale),
            context_identifier: other.context_identifier.or(self.context_identifier),
            context_type: other.context_type.or(self.context_type),
            move_origin_to_offset: other.move_origin_to_offset.or(self.move_origin_to_offset),
        }
    }

    fn matches_context(&self, context: &DecodedEntity, layout: &ContextLayout) -> bool {
        let matches = |wanted: &Option<String>, index: usize| match wanted {
            None => true,
            Some(wanted) => context
                .get_string(index)
                .map(|value| value.eq_ignore_ascii_case(wanted))
                .unwrap_or(false),
        };
        matches(&self.context_identifier, layout.identifier)
            && matches(&self.context_type, layout.context_type)
    }
}

#[derive(Debug, Default)]
pub struct MapConversionState {
    dropped: FxHashSet<EntityId>,
    layout: Option<ContextLayout>,
}

impl MapConversionState {
    pub fn is_dropped(&self, id: EntityId) -> bool {
        self.dropped.contains(&id)
    }
}

pub struct MapConversionTransform {
    config: TransformConfig,
    preferences: MapConversionPreferences,
}

impl MapConversionTransform {
    pub fn new(preferences: MapConversionPreferences) -> Self {
        Self {
            config: TransformConfig::default(),
            preferences,
        }
    }

    pub fn with_config(mut self, config: TransformConfig) -> Self {
        self.config = config;
        self
    }

    pub fn preferences(&self) -> &MapConversionPreferences {
        &self.preferences
    }
}

/// Replace a context's world placement by one at the origin
///
/// Returns the previous origin, or `None` if it already was at zero.
fn reset_origin(
    target: &mut MemoryModel,
    context: &DecodedEntity,
    layout: &ContextLayout,
    added: &mut Vec<EntityId>,
) -> Result<Option<[f64; 3]>> {
    let Some(placement) = context
        .get_ref(layout.world_coordinate_system)
        .and_then(|id| target.get(id))
    else {
        return Ok(None);
    };
    let Some(location) = placement
        .get_ref(layout.location)
        .and_then(|id| target.get(id))
    else {
        return Ok(None);
    };
    let coordinates: Vec<f64> = location
        .get(layout.coordinates)
        .and_then(|v| v.as_list())
        .map(|list| list.iter().filter_map(|c| c.as_float()).collect())
        .unwrap_or_default();
    if coordinates.iter().all(|c| *c == 0.0) {
        return Ok(None);
    }

    let origin = target
        .build(location.ifc_type.name())
        .with_index(layout.coordinates, vec![0.0; coordinates.len()])
        .finish()?;
    let moved = target.create(placement.ifc_type.name())?;
    for (index, value) in placement.attributes.iter().enumerate() {
        let value = if index == layout.location {
            AttributeValue::EntityRef(origin)
        } else {
            value.clone()
        };
        target.set_attribute(moved, index, value)?;
    }
    target.set_attribute(
        context.id,
        layout.world_coordinate_system,
        AttributeValue::EntityRef(moved),
    )?;
    added.extend([origin, moved]);

    let mut offset = [0.0; 3];
    for (slot, value) in offset.iter_mut().zip(coordinates) {
        *slot = value;
    }
    Ok(Some(offset))
}

impl ModelTransform for MapConversionTransform {
    type State = MapConversionState;

    fn name(&self) -> &str {
        "MapConversion"
    }

    fn config(&self) -> &TransformConfig {
        &self.config
    }

    fn create_transform_package(
        &self,
        source: Arc<dyn IfcModel>,
        target: ModelHandle,
        progress: ProgressToken,
    ) -> Result<TransformPackage<MapConversionState>> {
        Ok(TransformPackage::new(
            source,
            target,
            progress,
            self.config.log_filter,
            MapConversionState::default(),
        ))
    }

    fn do_preprocess_transform(
        &self,
        package: &mut TransformPackage<MapConversionState>,
    ) -> Result<PhaseOutcome> {
        if self.preferences.crs_name.is_none() {
            return Err(TransformError::config("map conversion: CRS name is missing"));
        }
        if self.preferences.geodetic_datum.is_none() {
            return Err(TransformError::config("map conversion: geodetic datum is missing"));
        }

        let model = package.source_model();
        let layout = ContextLayout::resolve(model.schema())?;
        let mut dropped: FxHashSet<EntityId> = ids_of_kind(model, "IFCMAPCONVERSION")
            .into_iter()
            .chain(ids_of_kind(model, "IFCPROJECTEDCRS"))
            .collect();

        // units only held by what is replaced go as well
        let units: Vec<EntityId> = ids_of_kind(model, "IFCNAMEDUNIT")
            .into_iter()
            .chain(ids_of_kind(model, "IFCMEASUREWITHUNIT"))
            .collect();
        let inverses = package.inverses();
        loop {
            let mut changed = false;
            for unit in &units {
                if dropped.contains(unit) {
                    continue;
                }
                let referrers = inverses.referrers(*unit);
                if !referrers.is_empty() && referrers.iter().all(|r| dropped.contains(&r.entity)) {
                    dropped.insert(*unit);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        for unit in units.iter().filter(|u| !dropped.contains(u)) {
            if inverses
                .referrers(*unit)
                .iter()
                .any(|r| dropped.contains(&r.entity))
            {
                log::warn!("{}: unit {} is still in use and kept", self.name(), unit);
            }
        }

        log::debug!("map conversion replaces {} entities", dropped.len());
        let state = package.state_mut();
        state.dropped = dropped;
        state.layout = Some(layout);
        Ok(PhaseOutcome::Proceed)
    }

    fn pass_instance(
        &self,
        entity: &DecodedEntity,
        package: &mut TransformPackage<MapConversionState>,
    ) -> Result<PassDecision> {
        Ok(if package.state().is_dropped(entity.id) {
            PassDecision::Drop
        } else {
            PassDecision::Copy
        })
    }

    fn do_post_transform(&self, package: &mut TransformPackage<MapConversionState>) -> Result<()> {
        let prefs = &self.preferences;
        let layout = match package.state().layout {
            Some(layout) => layout,
            None => ContextLayout::resolve(package.source_model().schema())?,
        };
        let contexts: Vec<Arc<DecodedEntity>> = package
            .target_read()
            .entities_by_type(&IfcType::IfcGeometricRepresentationContext)
            .into_iter()
            .filter(|context| prefs.matches_context(context, &layout))
            .collect();
        if contexts.is_empty() {
            log::warn!(
                "{}: no representation context matches, nothing added",
                self.name()
            );
            return Ok(());
        }

        let prefix = prefs.map_unit_prefix.as_deref();
        let to_map_unit = package.source_model().factors().length_to_metres
            / prefix_scale(prefix.unwrap_or(""));
        let mut added = Vec::new();
        let mut modified = Vec::new();
        {
            let mut target = package.target_mut();
            let unit = target
                .build("IfcSIUnit")
                .with("UnitType", AttributeValue::enumeration("LENGTHUNIT"))
                .with_opt("Prefix", prefix.map(AttributeValue::enumeration))
                .with("Name", AttributeValue::enumeration("METRE"))
                .finish()?;
            let crs = target
                .build("IfcProjectedCRS")
                .with_opt("Name", prefs.crs_name.clone())
                .with_opt("Description", prefs.crs_description.clone())
                .with_opt("GeodeticDatum", prefs.geodetic_datum.clone())
                .with_opt("VerticalDatum", prefs.vertical_datum.clone())
                .with_opt("MapProjection", prefs.map_projection.clone())
                .with_opt("MapZone", prefs.map_zone.clone())
                .with("MapUnit", unit)
                .finish()?;
            added.extend([unit, crs]);

            for context in &contexts {
                let mut offset = [0.0; 3];
                if prefs.move_origin_to_offset.unwrap_or(false) {
                    if let Some(origin) = reset_origin(&mut target, context, &layout, &mut added)? {
                        for (slot, value) in offset.iter_mut().zip(origin) {
                            *slot = value * to_map_unit;
                        }
                        modified.push(context.id);
                    }
                }
                let conversion = target
                    .build("IfcMapConversion")
                    .with("SourceCRS", context.id)
                    .with("TargetCRS", crs)
                    .with("Eastings", prefs.eastings.unwrap_or(0.0) + offset[0])
                    .with("Northings", prefs.northings.unwrap_or(0.0) + offset[1])
                    .with(
                        "OrthogonalHeight",
                        prefs.orthogonal_height.unwrap_or(0.0) + offset[2],
                    )
                    .with_opt("XAxisAbscissa", prefs.x_axis_abscissa)
                    .with_opt("XAxisOrdinate", prefs.x_axis_ordinate)
                    .with_opt("Scale", prefs.scale)
                    .finish()?;
                log::debug!(
                    "{}: {} converts context {}",
                    self.name(),
                    conversion,
                    context.id
                );
                added.push(conversion);
            }
        }

        for id in added {
            package.log_target(id, TransformAction::Added);
        }
        for id in modified {
            package.log_target(id, TransformAction::Modified);
        }
        Ok(())
    }
}
