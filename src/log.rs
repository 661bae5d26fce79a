//! The `log` module defines an interface to the crate's internal logging
//! facilities. Logging is about internal behavior; it is not to be
//! confused with _reporting_, which records simulation output.
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`,
//! `info!`, `debug!` and `trace!`, where `error!` is the highest
//! priority and `trace!` the lowest. Logging is _disabled_ by default;
//! use `enable_logging()`, `disable_logging()` or
//! `set_log_level(level)` to control it.

pub use log::{debug, error, info, trace, warn, LevelFilter};

use std::sync::Once;

// Logging disabled.
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

static INIT_LOGGER: Once = Once::new();

/// Enables the logger with no level filter / full logging. Equivalent to
/// `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to
/// `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(DEFAULT_LOG_LEVEL);
}

/// Sets the global log level.
///
/// The backing `env_logger` is installed on first use with no filter of
/// its own; the effective level is controlled through the `log` facade's
/// max-level so it can be changed at any time afterwards.
pub fn set_log_level(level: LevelFilter) {
    INIT_LOGGER.call_once(|| {
        let logger = env_logger::Builder::new()
            .filter_level(LevelFilter::Trace)
            .build();
        // If the embedding application already installed a logger, level
        // control still works through the facade below.
        let _ = log::set_boxed_logger(Box::new(logger));
    });
    log::set_max_level(level);
}
