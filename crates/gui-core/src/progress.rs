// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Shared progress-bar arithmetic
//!
//! Both the global indicator and the per-row toggle bars use the same
//! "creep" curve: each step covers a fraction of the distance left to the
//! ceiling, never less than one point, so the bar slows down as it gets
//! closer without ever claiming completion.

/// Progress shown the moment work starts
pub const START_PROGRESS: f32 = 10.0;

/// Highest value a bar reaches while work is still running
pub const CREEP_CEILING: f32 = 90.0;

/// Value set once work has finished
pub const COMPLETE_PROGRESS: f32 = 100.0;

/// Creep factor for the global indicator
pub const GLOBAL_CREEP_FACTOR: f32 = 0.14;

/// Creep factor for per-row toggle bars
pub const TOGGLE_CREEP_FACTOR: f32 = 0.18;

/// Advance `current` one creep step towards [`CREEP_CEILING`].
pub fn creep_step(current: f32, factor: f32) -> f32 {
    if current >= CREEP_CEILING {
        return current;
    }
    let remaining = CREEP_CEILING - current;
    let step = (remaining * factor).max(1.0);
    (current + step).min(CREEP_CEILING)
}
