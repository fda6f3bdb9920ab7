// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outcome of a transformation run

use crate::{LogEntry, Result, TransformAction, TransformError};
use ifc_lite_store::{MemoryModel, ModelHandle};
use std::fmt;
use std::sync::Arc;

/// Completion code of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformCode {
    /// All phases succeeded and the target was committed
    Finished,
    Canceled,
    /// A fault aborted the run, see [`TransformResult::cause`]
    ExitWithError,
    /// The policy declined the source during preprocessing
    NotSupported,
}

impl fmt::Display for TransformCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// What a run hands back to the caller
///
/// The log is always present. The target store only holds the copy when the
/// code is [`TransformCode::Finished`]; otherwise it was rolled back.
#[derive(Debug)]
pub struct TransformResult {
    pub code: TransformCode,
    pub target: ModelHandle,
    pub log: Vec<LogEntry>,
    pub cause: Option<TransformError>,
    pub message: Option<String>,
}

impl TransformResult {
    pub(crate) fn new(code: TransformCode, target: ModelHandle, log: Vec<LogEntry>) -> Self {
        Self {
            code,
            target,
            log,
            cause: None,
            message: None,
        }
    }

    pub(crate) fn with_cause(mut self, cause: TransformError) -> Self {
        self.message = Some(cause.to_string());
        self.cause = Some(cause);
        self
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_finished(&self) -> bool {
        self.code == TransformCode::Finished
    }

    /// Number of log entries for an action
    pub fn count(&self, action: TransformAction) -> usize {
        self.log.iter().filter(|e| e.action == action).count()
    }

    /// Log entries for an action, in log order
    pub fn entries(&self, action: TransformAction) -> impl Iterator<Item = &LogEntry> + '_ {
        self.log.iter().filter(move |e| e.action == action)
    }

    /// Take the committed target store, e.g. as the source of another run
    pub fn into_model(self) -> Result<MemoryModel> {
        if self.code != TransformCode::Finished {
            return Err(TransformError::other(format!(
                "run ended {}, no target to take",
                self.code
            )));
        }
        Arc::try_unwrap(self.target)
            .map(|lock| lock.into_inner())
            .map_err(|_| TransformError::other("target store is still shared"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use ifc_lite_model::{EntityId, InstanceHandle, ModelId, SchemaRegistry};
    use ifc_lite_store::new_handle;

    fn entry(label: u32, action: TransformAction) -> LogEntry {
        LogEntry {
            entity: InstanceHandle::new(ModelId(1), EntityId(label)),
            action,
        }
    }

    #[test]
    fn test_counts_by_action() {
        let result = TransformResult::new(
            TransformCode::Finished,
            new_handle(SchemaRegistry::ifc4()),
            vec![
                entry(1, TransformAction::Copied),
                entry(2, TransformAction::Skipped),
                entry(3, TransformAction::Copied),
            ],
        );
        assert_eq!(result.count(TransformAction::Copied), 2);
        assert_eq!(result.count(TransformAction::Added), 0);
        let skipped: Vec<_> = result
            .entries(TransformAction::Skipped)
            .map(|e| e.label())
            .collect();
        assert_eq!(skipped, vec![EntityId(2)]);
    }

    #[test]
    fn test_into_model_needs_a_finished_unshared_target() {
        let handle = new_handle(SchemaRegistry::ifc4());
        let shared = TransformResult::new(TransformCode::Finished, Arc::clone(&handle), Vec::new());
        assert!(shared.into_model().is_err());
        drop(handle);

        let failed = TransformResult::new(
            TransformCode::ExitWithError,
            new_handle(SchemaRegistry::ifc4()),
            Vec::new(),
        )
        .with_cause(TransformError::other("boom"));
        assert_eq!(failed.message.as_deref(), Some("boom"));
        assert!(failed.into_model().is_err());

        let model = fixtures::pset_model();
        let count = model.len();
        let finished = TransformResult::new(
            TransformCode::Finished,
            Arc::new(parking_lot::RwLock::new(model)),
            Vec::new(),
        );
        assert_eq!(finished.into_model().unwrap().len(), count);
    }
}
