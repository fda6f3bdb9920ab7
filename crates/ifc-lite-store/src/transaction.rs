// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared store handle and scoped write sessions

use crate::MemoryModel;
use ifc_lite_model::{ModelError, Result, SchemaRegistry};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shareable handle to a store
pub type ModelHandle = Arc<RwLock<MemoryModel>>;

/// Create a handle over an empty store
pub fn new_handle(schema: Arc<SchemaRegistry>) -> ModelHandle {
    Arc::new(RwLock::new(MemoryModel::new(schema)))
}

/// Scoped write session over a [`ModelHandle`]
///
/// Rolls the store back when dropped without [`Transaction::commit`], so
/// every exit path releases the session.
#[derive(Debug)]
pub struct Transaction {
    handle: ModelHandle,
    open: bool,
}

impl Transaction {
    /// Open a transaction on the store behind `handle`
    pub fn begin(handle: &ModelHandle, name: &str) -> Result<Self> {
        handle.write().begin_transaction(name)?;
        Ok(Self {
            handle: Arc::clone(handle),
            open: true,
        })
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn commit(mut self) -> Result<()> {
        self.close(true)
    }

    pub fn rollback(mut self) -> Result<()> {
        self.close(false)
    }

    fn close(&mut self, commit: bool) -> Result<()> {
        if !self.open {
            return Err(ModelError::NoTransaction);
        }
        self.open = false;
        let mut model = self.handle.write();
        if commit {
            model.commit()
        } else {
            model.rollback()
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.close(false) {
                log::warn!("implicit rollback failed: {}", err);
            }
        }
    }
}
