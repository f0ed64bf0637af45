// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Tracing initialisation shared by the GUI shells

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `default_filter` applies when `RUST_LOG` is unset, e.g.
/// `"localdomain_gui_core=info"`. Calling this twice is harmless; the
/// second registration is ignored.
pub fn init_tracing(default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
