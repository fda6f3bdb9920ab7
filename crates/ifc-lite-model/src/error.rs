// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for entity store and schema operations

use crate::EntityId;
use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised by schema lookups and entity store mutations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Entity not found
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// Label already taken by another entity
    #[error("Entity {0} already exists")]
    DuplicateEntity(EntityId),

    /// Type name not known to the schema
    #[error("Unknown entity type: {0}")]
    UnknownType(String),

    /// Abstract types cannot be instantiated
    #[error("Entity type {0} is abstract")]
    AbstractType(String),

    /// Attribute name not declared on the type
    #[error("Entity type {entity_type} has no attribute '{attribute}'")]
    UnknownAttribute {
        entity_type: String,
        attribute: String,
    },

    /// Positional attribute out of range
    #[error("Attribute index {index} out of range on entity {entity} ({count} attributes)")]
    AttributeIndex {
        entity: EntityId,
        index: usize,
        count: usize,
    },

    /// Value shape does not fit the declared attribute kind
    #[error(
        "Schema mismatch at entity {entity} ({entity_type}): expected {expected}, got {actual}"
    )]
    SchemaMismatch {
        entity: EntityId,
        entity_type: String,
        expected: String,
        actual: String,
    },

    /// Schema definition is inconsistent
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Mutation attempted without an open transaction
    #[error("No transaction is active")]
    NoTransaction,

    /// Nested transactions are not supported
    #[error("Transaction '{0}' is already active")]
    TransactionActive(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ModelError {
    /// Create an unknown attribute error
    pub fn unknown_attribute(entity_type: impl Into<String>, attribute: impl Into<String>) -> Self {
        ModelError::UnknownAttribute {
            entity_type: entity_type.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(
        entity: EntityId,
        entity_type: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        ModelError::SchemaMismatch {
            entity,
            entity_type: entity_type.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid schema error
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        ModelError::InvalidSchema(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        ModelError::Other(msg.into())
    }
}
