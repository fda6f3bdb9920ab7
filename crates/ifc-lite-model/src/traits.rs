// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core model trait
//!
//! Read-only view of an entity store together with its schema metadata and
//! numeric factors. Transformations consume sources through this trait only.

use crate::{EntityResolver, ModelFactors, ModelId, ModelMetadata, SchemaRegistry};
use std::sync::Arc;

/// Core model interface - read-only access to an IFC entity store
///
/// The model is thread-safe (`Send + Sync`) so a source can be shared with an
/// asynchronous transformation run.
pub trait IfcModel: Send + Sync {
    /// Process-unique identity of this store
    fn model_id(&self) -> ModelId;

    /// Get entity resolver for entity lookups and reference resolution
    fn resolver(&self) -> &dyn EntityResolver;

    /// Schema the entities of this store conform to
    fn schema(&self) -> &Arc<SchemaRegistry>;

    /// Unit and precision factors
    fn factors(&self) -> ModelFactors;

    /// Get unit scale factor (file units to meters)
    fn unit_scale(&self) -> f64 {
        self.factors().length_to_metres
    }

    /// Get file metadata (schema version, originating system, etc.)
    fn metadata(&self) -> &ModelMetadata;
}
