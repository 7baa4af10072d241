/// Logger configuration with a process-wide config cell.
///
/// The embedding process configures this programmatically at startup;
/// defaults show Info and above with no per-tag debug output.
use std::collections::HashSet;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::levels::LogLevel;
use super::tags::LogTag;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level threshold; messages above it are dropped
    pub min_level: LogLevel,

    /// Tags with debug output enabled (debug keys, lowercase)
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> = Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .map(|cfg| cfg.clone())
        .unwrap_or_default()
}

pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut cfg) = LOGGER_CONFIG.write() {
        *cfg = config;
    }
}

/// Enable debug output for a single tag
pub fn enable_debug_for(tag: LogTag) {
    if let Ok(mut cfg) = LOGGER_CONFIG.write() {
        cfg.debug_tags.insert(tag.to_debug_key());
    }
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG
        .read()
        .map(|cfg| cfg.debug_tags.contains(&tag.to_debug_key()))
        .unwrap_or(false)
}
