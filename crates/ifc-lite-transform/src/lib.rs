// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Lite Transform - Identity-preserving model transformations
//!
//! A transformation reads a source model, asks a policy what to do with every
//! entity and writes the result into a fresh target model. Each copied entity
//! is registered in an identity map, so references are rewired to the target
//! and no source entity is copied twice.
//!
//! # Architecture
//!
//! - [`ModelTransform`] - Policy hooks: pass decisions, property rewriting,
//!   pre and post processing
//! - [`ModelTransformExt::run`] - Asynchronous driver with progress and
//!   cancellation through a [`ProgressToken`]
//! - [`TransformPackage`] - Per-run context: source, target, identity map,
//!   log and policy state
//! - [`HierarchyIndex`] - Levels of entities along [`RelationInfo`] edges
//! - [`policies`] - Filtering, property set removal, georeferencing and
//!   depth-bounded aggregation
//!
//! # Example
//!
//! ```ignore
//! use ifc_lite_transform::{ModelFilterPreferences, ModelFilterTransform, ModelTransformExt};
//!
//! let prefs = ModelFilterPreferences::default().include_type("IfcWall");
//! let (progress, run) = ModelFilterTransform::new(prefs).prepare(source);
//! let result = run.await;
//! println!("{}: {} entries", result.code, result.log.len());
//! ```

mod config;
mod engine;
mod error;
mod hierarchy;
mod identity_map;
mod package;
pub mod policies;
mod progress;
mod relation;
mod result;

#[cfg(test)]
mod fixtures;

pub use config::{EditorCredentials, LogEntry, LogFilter, TransformAction, TransformConfig};
pub use engine::{
    copy_instance, forward_property, pass_decision, ModelTransform, ModelTransformExt,
    PassDecision, PhaseOutcome, RunFuture,
};
pub use error::{Result, TransformError};
pub use hierarchy::{HierarchyIndex, NodeAtLevel};
pub use identity_map::IdentityMap;
pub use package::TransformPackage;
pub use policies::*;
pub use progress::{ProgressEvent, ProgressState, ProgressToken};
pub use relation::{RelationInfo, RelationKind};
pub use result::{TransformCode, TransformResult};
