//! Structured console logging for runboard
//!
//! Tagged, leveled, colored output with per-tag debug gating:
//! - Standard log levels (Error/Warning/Info/Debug)
//! - Per-subsystem debug control via `enable_debug_for(LogTag::...)`
//! - Colored console output
//!
//! ## Usage
//!
//! ```rust
//! use runboard::logger::{self, LogTag};
//!
//! logger::error(LogTag::Upstream, "Connection failed");
//! logger::warning(LogTag::Jobs, "History limit reached");
//! logger::info(LogTag::Cache, "Cache cleared");
//! logger::debug(LogTag::Aggregator, "Batch details: ..."); // Only if enabled for the tag
//! ```

mod config;
mod format;
mod levels;
mod tags;

pub use config::{enable_debug_for, get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Check against minimum log level threshold
/// 3. Debug level requires debug mode for that specific tag
fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let cfg = config::get_logger_config();
    if level > cfg.min_level && level != LogLevel::Debug {
        return false;
    }

    if level == LogLevel::Debug {
        return cfg.min_level >= LogLevel::Debug || config::is_debug_enabled_for_tag(tag);
    }

    true
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    format::format_and_log(tag, level.as_str(), message);
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
///
/// Debug logs are only shown when debug mode is enabled for the tag
/// (or the global minimum level is Debug).
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_always_logs() {
        assert!(should_log(&LogTag::System, LogLevel::Error));
    }

    #[test]
    fn test_debug_gated_per_tag() {
        assert!(!should_log(&LogTag::Aggregator, LogLevel::Debug));
        enable_debug_for(LogTag::Aggregator);
        assert!(should_log(&LogTag::Aggregator, LogLevel::Debug));
    }
}
