//! Default values applied when neither the settings file nor the environment
//! provides a value.
//!
//! # Design
//! - Keep broker fallbacks in one place so bootstrap and tests agree.
//! - Keep time-based defaults explicit for auditability.

/// Settings file consulted when no explicit path is supplied.
pub const DEFAULT_CONFIG_FILE: &str = "config/appsettings.json";
/// Broker user applied when the configured value is missing or empty.
pub(crate) const DEFAULT_BROKER_USER: &str = "guest";
/// Broker password applied when the configured value is missing or empty.
pub(crate) const DEFAULT_BROKER_PASSWORD: &str = "guest";
/// Broker host applied when none is configured.
pub(crate) const DEFAULT_BROKER_HOST: &str = "localhost";
/// Broker port applied when none is configured.
pub(crate) const DEFAULT_BROKER_PORT: u16 = 5672;
/// Wall-clock budget for one archive when none is configured.
pub(crate) const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 60;
