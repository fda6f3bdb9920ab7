// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Lite Model - Shared types, schema metadata and store traits
//!
//! This crate provides the core abstractions for working with IFC (Industry
//! Foundation Classes) entity graphs independently of the store holding them.
//!
//! # Architecture
//!
//! - [`IfcModel`] - Read-only access to a store, its schema and factors
//! - [`EntityResolver`] - Entity lookup and reference resolution
//! - [`SchemaRegistry`] - Runtime type registry with flattened
//!   [`PropertyDescriptor`]s for forward and inverse properties
//! - [`InverseIndex`] / [`Navigator`] - Back-reference navigation
//!
//! # Example
//!
//! ```ignore
//! use ifc_lite_model::{IfcModel, InverseIndex, Navigator, EntityId};
//!
//! let index = InverseIndex::build(&model);
//! let nav = Navigator::new(&model, &index);
//! for rel in nav.related_by_name(EntityId(42), "IsDefinedBy")? {
//!     println!("defined by {}", rel);
//! }
//! ```

pub mod error;
pub mod ifc4;
pub mod navigate;
pub mod resolver;
pub mod schema;
pub mod traits;
pub mod types;

// Re-export all public types
pub use error::*;
pub use navigate::*;
pub use resolver::*;
pub use schema::*;
pub use traits::*;
pub use types::*;
