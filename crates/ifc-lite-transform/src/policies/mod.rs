// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ready-made transformation policies

mod filter;
mod map_conversion;
mod pset_removal;
mod topology;

pub use filter::{FilterState, ModelFilterPreferences, ModelFilterStrategy, ModelFilterTransform};
pub use map_conversion::{MapConversionPreferences, MapConversionState, MapConversionTransform};
pub use pset_removal::{
    FilterRuleStrategy, PropertySetRemovalPreferences, PropertySetRemovalState,
    PropertySetRemovalTransform,
};
pub use topology::{TopologyAggregationPreferences, TopologyAggregationTransform, TopologyState};

use ifc_lite_model::{EntityId, IfcModel};

/// Labels of all entities whose type is `ancestor` or one of its subtypes
pub(crate) fn ids_of_kind(model: &dyn IfcModel, ancestor: &str) -> Vec<EntityId> {
    let resolver = model.resolver();
    let schema = model.schema();
    resolver
        .all_ids()
        .into_iter()
        .filter(|id| {
            resolver
                .get(*id)
                .map(|e| schema.is_subtype_of(e.ifc_type.name(), ancestor))
                .unwrap_or(false)
        })
        .collect()
}
