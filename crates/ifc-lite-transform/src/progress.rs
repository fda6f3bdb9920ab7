// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cooperative cancellation and progress reporting
//!
//! A [`ProgressToken`] is shared between the caller, who may cancel and
//! observe it, and the engine, which polls it between entities. State changes
//! are monotonic: once a token leaves `Alive` it never returns.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Run-control state of a token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProgressState {
    /// Run may proceed
    Alive = 0,
    /// Cancellation requested, the engine stops at the next entity
    AboutCancelling = 1,
    /// Run stopped after a cancellation request
    Canceled = 2,
    /// Run stopped on a fault
    Broken = 3,
    /// Run ended regularly
    Terminated = 4,
}

impl ProgressState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProgressState::Alive,
            1 => ProgressState::AboutCancelling,
            2 => ProgressState::Canceled,
            3 => ProgressState::Broken,
            _ => ProgressState::Terminated,
        }
    }

    fn can_become(self, next: ProgressState) -> bool {
        use ProgressState::*;
        matches!(
            (self, next),
            (Alive, AboutCancelling)
                | (Alive, Broken)
                | (Alive, Terminated)
                | (AboutCancelling, Canceled)
                | (AboutCancelling, Broken)
        )
    }

    pub fn is_final(self) -> bool {
        matches!(
            self,
            ProgressState::Canceled | ProgressState::Broken | ProgressState::Terminated
        )
    }
}

/// Notification delivered to a progress observer
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    Changed { percent: f32, message: String },
    Ended { message: String },
}

type Observer = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct Inner {
    state: AtomicU8,
    estimate: AtomicU64,
    done: AtomicU64,
    /// Last whole percentage announced, `u32::MAX` before the first
    announced: AtomicU32,
    message: Mutex<String>,
    observer: RwLock<Option<Observer>>,
}

/// Shared, pollable run-control handle
#[derive(Clone)]
pub struct ProgressToken {
    inner: Arc<Inner>,
}

impl Default for ProgressToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressToken")
            .field("state", &self.state())
            .field("percent", &self.percentage())
            .field("message", &self.message())
            .finish()
    }
}

impl ProgressToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(ProgressState::Alive as u8),
                estimate: AtomicU64::new(0),
                done: AtomicU64::new(0),
                announced: AtomicU32::new(u32::MAX),
                message: Mutex::new(String::new()),
                observer: RwLock::new(None),
            }),
        }
    }

    /// Install the observer receiving progress events
    pub fn on_progress(&self, observer: impl Fn(&ProgressEvent) + Send + Sync + 'static) {
        *self.inner.observer.write() = Some(Arc::new(observer));
    }

    pub fn state(&self) -> ProgressState {
        ProgressState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_alive(&self) -> bool {
        self.state() == ProgressState::Alive
    }

    /// Whether a cancellation was requested or the run already stopped
    pub fn is_about_cancelling(&self) -> bool {
        matches!(
            self.state(),
            ProgressState::AboutCancelling | ProgressState::Canceled | ProgressState::Broken
        )
    }

    pub fn is_canceled_or_broken(&self) -> bool {
        matches!(
            self.state(),
            ProgressState::Canceled | ProgressState::Broken
        )
    }

    /// Request cancellation; false if the token is not alive
    pub fn cancel(&self) -> bool {
        self.transition(ProgressState::AboutCancelling)
    }

    pub(crate) fn mark_canceled(&self) -> bool {
        self.transition(ProgressState::Canceled)
    }

    pub(crate) fn mark_broken(&self) -> bool {
        self.transition(ProgressState::Broken)
    }

    fn transition(&self, next: ProgressState) -> bool {
        let mut current = self.inner.state.load(Ordering::Acquire);
        loop {
            if !ProgressState::from_u8(current).can_become(next) {
                return false;
            }
            match self.inner.state.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Total units of work expected
    pub fn set_estimate(&self, units: u64) {
        self.inner.estimate.store(units, Ordering::Release);
        self.inner.done.store(0, Ordering::Release);
        self.inner.announced.store(u32::MAX, Ordering::Release);
    }

    pub fn estimate(&self) -> u64 {
        self.inner.estimate.load(Ordering::Acquire)
    }

    /// Units of work done so far
    pub fn done(&self) -> u64 {
        self.inner.done.load(Ordering::Acquire)
    }

    /// Add finished units, optionally replacing the message
    ///
    /// Observers hear about it when the whole percentage changes.
    pub fn report(&self, units: u64, message: Option<&str>) {
        self.inner.done.fetch_add(units, Ordering::AcqRel);
        if let Some(message) = message {
            *self.inner.message.lock() = message.to_string();
        }
        let percent = self.percentage();
        let whole = percent.floor() as u32;
        if self.inner.announced.swap(whole, Ordering::AcqRel) != whole || message.is_some() {
            self.emit(ProgressEvent::Changed {
                percent,
                message: self.message(),
            });
        }
    }

    /// Replace the message and notify observers
    pub fn notify(&self, message: &str) {
        *self.inner.message.lock() = message.to_string();
        self.emit(ProgressEvent::Changed {
            percent: self.percentage(),
            message: message.to_string(),
        });
    }

    /// Completion in percent, 0 without an estimate
    pub fn percentage(&self) -> f32 {
        let estimate = self.estimate();
        if estimate == 0 {
            return 0.0;
        }
        let done = self.done().min(estimate);
        (done as f64 * 100.0 / estimate as f64) as f32
    }

    pub fn message(&self) -> String {
        self.inner.message.lock().clone()
    }

    /// End the run: an alive token becomes terminated, observers get `Ended`
    pub fn finish(&self, message: &str) {
        self.transition(ProgressState::Terminated);
        *self.inner.message.lock() = message.to_string();
        self.emit(ProgressEvent::Ended {
            message: message.to_string(),
        });
    }

    fn emit(&self, event: ProgressEvent) {
        let observer = self.inner.observer.read().clone();
        if let Some(observer) = observer {
            observer(&event);
        }
    }
}
