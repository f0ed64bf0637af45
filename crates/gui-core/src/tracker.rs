// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Global loading indicator
//!
//! Every backend command the sharing flow issues is wrapped in
//! [`TaskTracker::track`]. The tracker counts outstanding operations and
//! drives a single progress bar from that count: shown at 10% when the first
//! operation starts, creeping towards 90% while anything is running, and
//! finished at 100% only after the last one completes and the bar has been
//! on screen for the minimum visible time.
//!
//! The timing rules live in [`IndicatorMachine`], which takes the current
//! instant as an argument and never sleeps. [`TaskTracker`] owns one machine
//! and a driver task that wakes it at its next deadline.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use localdomain_common::ProgressConfig;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::progress::{
    creep_step, COMPLETE_PROGRESS, CREEP_CEILING, GLOBAL_CREEP_FACTOR, START_PROGRESS,
};

/// What the UI renders for the global bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorState {
    pub visible: bool,
    pub progress: f32,
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self {
            visible: false,
            progress: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPhase {
    Hidden,
    /// Work outstanding, bar creeping
    Showing,
    /// All work done; waiting out the minimum visible time
    Hiding { hide_at: Instant },
    /// Bar held at 100% for the finish animation
    Finishing { until: Instant },
}

#[derive(Debug, Clone, Copy)]
pub struct IndicatorTimings {
    pub min_visible: Duration,
    pub finish_anim: Duration,
    pub creep_interval: Duration,
}

impl From<&ProgressConfig> for IndicatorTimings {
    fn from(config: &ProgressConfig) -> Self {
        Self {
            min_visible: config.min_visible(),
            finish_anim: config.finish_anim(),
            creep_interval: config.creep_interval(),
        }
    }
}

/// Clock-free state machine behind the global indicator
#[derive(Debug)]
pub struct IndicatorMachine {
    timings: IndicatorTimings,
    phase: IndicatorPhase,
    outstanding: usize,
    progress: f32,
    shown_at: Option<Instant>,
    next_creep: Option<Instant>,
}

impl IndicatorMachine {
    pub fn new(timings: IndicatorTimings) -> Self {
        Self {
            timings,
            phase: IndicatorPhase::Hidden,
            outstanding: 0,
            progress: 0.0,
            shown_at: None,
            next_creep: None,
        }
    }

    pub fn phase(&self) -> IndicatorPhase {
        self.phase
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn state(&self) -> IndicatorState {
        IndicatorState {
            visible: self.phase != IndicatorPhase::Hidden,
            progress: self.progress,
        }
    }

    /// Record a new operation.
    ///
    /// Going from zero to one outstanding always starts a fresh show cycle,
    /// which also abandons a pending hide or finish.
    pub fn begin(&mut self, now: Instant) {
        self.outstanding += 1;
        if self.outstanding == 1 {
            self.phase = IndicatorPhase::Showing;
            self.progress = START_PROGRESS;
            self.shown_at = Some(now);
            self.next_creep = Some(now + self.timings.creep_interval);
        }
    }

    /// Record a finished operation, successful or not.
    pub fn end(&mut self, now: Instant) {
        if self.outstanding == 0 {
            debug!("Indicator end() without matching begin()");
            return;
        }
        self.outstanding -= 1;
        if self.outstanding > 0 {
            return;
        }

        self.next_creep = None;
        let elapsed = self
            .shown_at
            .map(|shown| now.saturating_duration_since(shown))
            .unwrap_or_default();
        let wait = self.timings.min_visible.saturating_sub(elapsed);
        self.phase = IndicatorPhase::Hiding { hide_at: now + wait };
    }

    /// Apply every timer that has come due by `now`.
    pub fn advance(&mut self, now: Instant) {
        loop {
            match self.phase {
                IndicatorPhase::Hidden => return,
                IndicatorPhase::Showing => {
                    while let Some(due) = self.next_creep {
                        if due > now {
                            break;
                        }
                        self.progress = creep_step(self.progress, GLOBAL_CREEP_FACTOR);
                        self.next_creep = if self.progress >= CREEP_CEILING {
                            None
                        } else {
                            Some(due + self.timings.creep_interval)
                        };
                    }
                    return;
                }
                IndicatorPhase::Hiding { hide_at } => {
                    if now < hide_at {
                        return;
                    }
                    self.progress = COMPLETE_PROGRESS;
                    self.phase = IndicatorPhase::Finishing {
                        until: hide_at + self.timings.finish_anim,
                    };
                }
                IndicatorPhase::Finishing { until } => {
                    if now < until {
                        return;
                    }
                    self.phase = IndicatorPhase::Hidden;
                    self.progress = 0.0;
                    self.shown_at = None;
                    return;
                }
            }
        }
    }

    /// Earliest instant at which [`advance`](Self::advance) has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            IndicatorPhase::Hidden => None,
            IndicatorPhase::Showing => self.next_creep,
            IndicatorPhase::Hiding { hide_at } => Some(hide_at),
            IndicatorPhase::Finishing { until } => Some(until),
        }
    }
}

struct TrackerShared {
    machine: Mutex<IndicatorMachine>,
    state_tx: watch::Sender<IndicatorState>,
    wake: Notify,
}

impl TrackerShared {
    fn machine(&self) -> MutexGuard<'_, IndicatorMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the machine, then publish the resulting state.
    ///
    /// The machine lock is held while publishing so concurrent updates
    /// reach subscribers in the order they were applied.
    fn update(&self, f: impl FnOnce(&mut IndicatorMachine)) {
        let mut machine = self.machine();
        f(&mut machine);
        let state = machine.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Cloneable handle to the global indicator
#[derive(Clone)]
pub struct TaskTracker {
    shared: Arc<TrackerShared>,
}

impl TaskTracker {
    pub fn new(config: &ProgressConfig) -> Self {
        let (state_tx, _) = watch::channel(IndicatorState::default());
        Self {
            shared: Arc::new(TrackerShared {
                machine: Mutex::new(IndicatorMachine::new(IndicatorTimings::from(config))),
                state_tx,
                wake: Notify::new(),
            }),
        }
    }

    /// Spawn the task that fires creep, hide and finish timers.
    ///
    /// Without it the counter and visibility still update, but the bar
    /// never moves past its starting value.
    pub fn spawn_driver(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            loop {
                let deadline = shared.machine().next_deadline();
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = shared.wake.notified() => {}
                    _ = sleep_until_deadline(deadline) => {}
                }
                shared.update(|machine| machine.advance(Instant::now()));
            }
            debug!("Indicator driver stopped");
        })
    }

    /// Await `fut` while counting it as an outstanding operation.
    ///
    /// The count is released even if `fut` fails or is dropped before
    /// completion; its output is returned unchanged.
    pub async fn track<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.enter();
        fut.await
    }

    fn enter(&self) -> TrackGuard {
        self.shared.update(|machine| machine.begin(Instant::now()));
        self.shared.wake.notify_one();
        trace!("Tracked operation started");
        TrackGuard {
            shared: self.shared.clone(),
        }
    }

    pub fn state(&self) -> IndicatorState {
        *self.shared.state_tx.borrow()
    }

    pub fn outstanding(&self) -> usize {
        self.shared.machine().outstanding()
    }

    pub fn subscribe(&self) -> watch::Receiver<IndicatorState> {
        self.shared.state_tx.subscribe()
    }
}

struct TrackGuard {
    shared: Arc<TrackerShared>,
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.shared.update(|machine| machine.end(Instant::now()));
        self.shared.wake.notify_one();
        trace!("Tracked operation finished");
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
