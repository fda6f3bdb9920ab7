// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Lite Store - In-memory transactional entity store
//!
//! This crate implements the `ifc-lite-model` traits over an in-memory,
//! journaled entity store. It serves both as a transformation source and as
//! the target a transformation writes into.
//!
//! # Features
//!
//! - **Declaration order** enumeration, stable across mutations
//! - **Journaled transactions** with full rollback
//! - **Schema checked** instantiation and attribute writes
//! - **Scoped write sessions** over a shared [`ModelHandle`]
//!
//! # Example
//!
//! ```ignore
//! use ifc_lite_store::MemoryModel;
//! use ifc_lite_model::SchemaRegistry;
//!
//! let mut model = MemoryModel::new(SchemaRegistry::ifc4());
//! let wall = model.transact("seed", |m| {
//!     m.build("IfcWall").with("Name", "Wall 1").finish()
//! })?;
//! ```

mod builder;
mod model;
mod transaction;
mod units;

pub use builder::EntityBuilder;
pub use model::MemoryModel;
pub use transaction::{new_handle, ModelHandle, Transaction};
pub use units::{derive_factors, prefix_scale};
