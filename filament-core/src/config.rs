//! Configuration
//!
//! Runtime and template settings. Every field has a default, so a config
//! file only needs the values it changes:
//!
//! ```json
//! { "runtime": { "max_tick_rounds": 500 }, "template": { "key_attribute": "data-key" } }
//! ```
//!
//! Settings are per thread, like the reactive runtime itself. Call
//! [`Config::install`] on each thread that renders.

use std::cell::RefCell;

use serde::Deserialize;

use crate::error::ConfigError;

/// Settings for the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on microtasks drained by a single `tick()`.
    pub max_tick_rounds: usize,

    /// Emit a `trace!` event for every flush.
    pub trace_flush: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tick_rounds: 10_000,
            trace_flush: false,
        }
    }
}

/// Settings for template evaluation and binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Attribute that carries a list item's reconciliation key.
    pub key_attribute: String,

    /// Prefix that turns an attribute into an event binding (`onclick`).
    pub event_prefix: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            key_attribute: "key".to_string(),
            event_prefix: "on".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub template: TemplateConfig,
}

thread_local! {
    static TEMPLATE_CONFIG: RefCell<TemplateConfig> = RefCell::new(TemplateConfig::default());
}

impl Config {
    /// Parse a JSON document, filling omitted fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_tick_rounds == 0 {
            return Err(ConfigError::Invalid {
                field: "runtime.max_tick_rounds",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.template.key_attribute.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "template.key_attribute",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply this configuration to the current thread.
    pub fn install(self) {
        crate::reactive::Runtime::configure(self.runtime);
        TEMPLATE_CONFIG.with(|cell| *cell.borrow_mut() = self.template);
    }
}

/// Read the current thread's template settings.
pub(crate) fn with_template_config<R>(f: impl FnOnce(&TemplateConfig) -> R) -> R {
    TEMPLATE_CONFIG.with(|cell| f(&cell.borrow()))
}
