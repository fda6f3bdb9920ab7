// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run configuration and the action log vocabulary

use crate::Result;
use ifc_lite_model::{EntityId, InstanceHandle, ModelMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to an entity during a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformAction {
    /// Source entity materialized in the target
    Copied,
    /// Source entity dropped
    Skipped,
    /// Target entity rewritten after its copy
    Modified,
    /// Target entity with no source counterpart
    Added,
}

impl TransformAction {
    pub const ALL: [TransformAction; 4] = [
        TransformAction::Copied,
        TransformAction::Skipped,
        TransformAction::Modified,
        TransformAction::Added,
    ];

    fn bit(self) -> u8 {
        match self {
            TransformAction::Copied => 1,
            TransformAction::Skipped => 2,
            TransformAction::Modified => 4,
            TransformAction::Added => 8,
        }
    }
}

impl fmt::Display for TransformAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Set of actions recorded in the log
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<TransformAction>", into = "Vec<TransformAction>")]
pub struct LogFilter(u8);

impl LogFilter {
    pub fn all() -> Self {
        Self::only(TransformAction::ALL)
    }

    pub fn none() -> Self {
        LogFilter(0)
    }

    pub fn only(actions: impl IntoIterator<Item = TransformAction>) -> Self {
        LogFilter(actions.into_iter().fold(0, |bits, a| bits | a.bit()))
    }

    pub fn with(self, action: TransformAction) -> Self {
        LogFilter(self.0 | action.bit())
    }

    pub fn without(self, action: TransformAction) -> Self {
        LogFilter(self.0 & !action.bit())
    }

    pub fn contains(&self, action: TransformAction) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn actions(&self) -> Vec<TransformAction> {
        TransformAction::ALL
            .into_iter()
            .filter(|a| self.contains(*a))
            .collect()
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for LogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions()).finish()
    }
}

impl From<Vec<TransformAction>> for LogFilter {
    fn from(actions: Vec<TransformAction>) -> Self {
        Self::only(actions)
    }
}

impl From<LogFilter> for Vec<TransformAction> {
    fn from(filter: LogFilter) -> Self {
        filter.actions()
    }
}

/// One recorded action
///
/// `Copied` and `Skipped` carry the source entity, `Added` and `Modified`
/// the target entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    pub entity: InstanceHandle,
    pub action: TransformAction,
}

impl LogEntry {
    pub fn label(&self) -> EntityId {
        self.entity.label
    }
}

/// Who is editing, stamped into the target's metadata
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorCredentials {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub organization: Option<String>,
    pub application_name: Option<String>,
    pub application_version: Option<String>,
}

impl EditorCredentials {
    pub fn with_name(mut self, given: &str, family: &str) -> Self {
        self.given_name = Some(given.to_string());
        self.family_name = Some(family.to_string());
        self
    }

    pub fn with_organization(mut self, organization: &str) -> Self {
        self.organization = Some(organization.to_string());
        self
    }

    pub fn with_application(mut self, name: &str, version: &str) -> Self {
        self.application_name = Some(name.to_string());
        self.application_version = Some(version.to_string());
        self
    }

    fn author(&self) -> Option<String> {
        match (&self.given_name, &self.family_name) {
            (Some(g), Some(f)) => Some(format!("{} {}", g, f)),
            (Some(n), None) | (None, Some(n)) => Some(n.clone()),
            (None, None) => None,
        }
    }

    /// Source metadata with the editor's identity applied
    pub fn stamp(&self, source: &ModelMetadata) -> ModelMetadata {
        let mut metadata = source.clone();
        if let Some(author) = self.author() {
            metadata.author = Some(author);
        }
        if let Some(organization) = &self.organization {
            metadata.organization = Some(organization.clone());
        }
        if let Some(app) = &self.application_name {
            metadata.originating_system = Some(match &self.application_version {
                Some(version) => format!("{} {}", app, version),
                None => app.clone(),
            });
        }
        metadata
    }
}

/// Settings shared by every transformation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub log_filter: LogFilter,
    pub editor: EditorCredentials,
}

impl TransformConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_log_filter(mut self, filter: LogFilter) -> Self {
        self.log_filter = filter;
        self
    }

    pub fn with_editor(mut self, editor: EditorCredentials) -> Self {
        self.editor = editor;
        self
    }
}
