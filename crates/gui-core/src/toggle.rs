// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Per-row progress for domain enable/disable toggles
//!
//! Each row in flight gets its own small bar, independent of the global
//! indicator. An id present in the map has a toggle running (or settling
//! at 100%); absent ids are idle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use localdomain_common::{ProgressConfig, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::progress::{creep_step, COMPLETE_PROGRESS, START_PROGRESS, TOGGLE_CREEP_FACTOR};

struct ToggleShared {
    rows: watch::Sender<HashMap<String, f32>>,
    creep_interval: Duration,
    settle: Duration,
}

impl ToggleShared {
    fn set(&self, id: &str, progress: f32) {
        self.rows.send_if_modified(|rows| match rows.get_mut(id) {
            Some(current) if *current != progress => {
                *current = progress;
                true
            }
            _ => false,
        });
    }

    fn creep(&self, id: &str) {
        self.rows.send_if_modified(|rows| match rows.get_mut(id) {
            Some(current) if *current < COMPLETE_PROGRESS => {
                let next = creep_step(*current, TOGGLE_CREEP_FACTOR);
                let changed = next != *current;
                *current = next;
                changed
            }
            _ => false,
        });
    }

    fn remove(&self, id: &str) {
        self.rows.send_if_modified(|rows| rows.remove(id).is_some());
    }
}

/// Removes the row when the toggle task ends, however it ends
struct RowGuard {
    shared: Arc<ToggleShared>,
    id: String,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        self.shared.remove(&self.id);
    }
}

#[derive(Clone)]
pub struct ToggleProgress {
    shared: Arc<ToggleShared>,
}

impl ToggleProgress {
    pub fn new(config: &ProgressConfig) -> Self {
        let (rows, _) = watch::channel(HashMap::new());
        Self {
            shared: Arc::new(ToggleShared {
                rows,
                creep_interval: config.creep_interval(),
                settle: config.toggle_settle(),
            }),
        }
    }

    /// Run `op` for row `id` with its own progress bar.
    ///
    /// Returns `None` without calling `op` if a toggle for `id` is already
    /// in flight. The returned task resolves to the operation's result once
    /// the row has settled and been cleared.
    pub fn run<F, Fut, T>(&self, id: &str, op: F) -> Option<JoinHandle<Result<T>>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let inserted = self.shared.rows.send_if_modified(|rows| {
            if rows.contains_key(id) {
                return false;
            }
            rows.insert(id.to_string(), START_PROGRESS);
            true
        });
        if !inserted {
            debug!("Toggle for {} already in flight, ignoring", id);
            return None;
        }

        let guard = RowGuard {
            shared: self.shared.clone(),
            id: id.to_string(),
        };
        Some(tokio::spawn(async move {
            let shared = guard.shared.clone();
            // Let the starting value reach the UI before the call goes out
            tokio::task::yield_now().await;

            let mut ticker = interval_at(
                Instant::now() + shared.creep_interval,
                shared.creep_interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let op = op();
            tokio::pin!(op);
            let result = loop {
                tokio::select! {
                    result = &mut op => break result,
                    _ = ticker.tick() => shared.creep(&guard.id),
                }
            };

            shared.set(&guard.id, COMPLETE_PROGRESS);
            tokio::time::sleep(shared.settle).await;
            drop(guard);
            result
        }))
    }

    pub fn progress(&self, id: &str) -> Option<f32> {
        self.shared.rows.borrow().get(id).copied()
    }

    /// Whether `id` has a toggle still running (not yet at 100%)
    pub fn is_toggling(&self, id: &str) -> bool {
        self.progress(id)
            .map(|p| p < COMPLETE_PROGRESS)
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> HashMap<String, f32> {
        self.shared.rows.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HashMap<String, f32>> {
        self.shared.rows.subscribe()
    }
}
