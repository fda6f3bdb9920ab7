// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for transformation runs

use crate::ProgressState;
use ifc_lite_model::{EntityId, ModelError};
use thiserror::Error;

/// Result type alias for transformation operations
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors raised while configuring or executing a transformation
#[derive(Error, Debug)]
pub enum TransformError {
    /// Store or schema fault
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be read
    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    /// A tracked relation exposes more than one parent
    #[error("Relation {relation} exposes {count} parents for entity {entity}")]
    MultipleParents {
        relation: String,
        entity: EntityId,
        count: usize,
    },

    /// A tracked relation loops back onto itself
    #[error("Relation {relation} forms a cycle through entity {entity}")]
    CyclicRelation { relation: String, entity: EntityId },

    /// Run requested with a token that can no longer drive a run
    #[error("Progress token is {0:?}, a run needs an alive token")]
    ProgressTerminated(ProgressState),

    /// Attempt to map one source entity to two targets (or vice versa)
    #[error("Entity {source_id} is already mapped to {existing}, cannot map it to {attempted}")]
    IdentityConflict {
        source_id: EntityId,
        existing: EntityId,
        attempted: EntityId,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl TransformError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TransformError::Config(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        TransformError::Other(msg.into())
    }

    /// Whether this error stems from configuration rather than data
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            TransformError::Config(_)
                | TransformError::Json(_)
                | TransformError::ProgressTerminated(_)
        )
    }
}
