// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Logging for the pulse compiler crates.
//!
//! All records are emitted with a `qpc::<module>` target so that compiler
//! output can be filtered with `RUST_LOG=qpc=debug` independent of the
//! binary using it.

use std::sync::atomic::{AtomicBool, Ordering};

pub use log::LevelFilter;

#[doc(hidden)]
pub use log as _log;

#[doc(hidden)]
#[macro_export]
macro_rules! __record {
    ($level:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::_log::$level!(target: concat!("qpc::", module_path!()), $msg $(, $arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($tokens:tt)+) => {
        $crate::__record!(info, $($tokens)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($($tokens:tt)+) => {
        $crate::__record!(warn, $($tokens)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($($tokens:tt)+) => {
        $crate::__record!(debug, $($tokens)+)
    };
}

/// Log at info level, but only with diagnostics enabled.
///
/// Diagnostics are the program listings and compiler decisions that are too
/// verbose for regular runs.
#[macro_export]
macro_rules! diagnostic {
    ($($tokens:tt)+) => {
        if $crate::is_diagnostics_enabled() {
            $crate::__record!(info, $($tokens)+)
        }
    };
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Install an `env_logger` at `level` and switch diagnostics on or off.
///
/// `RUST_LOG` takes precedence over `level`. Returns false if a logger was
/// already installed, in which case only the diagnostics switch changes.
pub fn init_logging(level: LevelFilter, with_diagnostics: bool) -> bool {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init()
        .is_ok()
}
