//! Structured logging for the dataflow runtime.
//!
//! Every net, channel and collector in the runtime owns a *log category*: a
//! named destination for lifecycle and debug events, mirroring the
//! `zlog_category_t` each Streamix net and channel end carried in the
//! original C runtime. Rather than re-implement a bespoke logging backend,
//! this crate is a thin façade over [`tracing`]: a category is a `tracing`
//! target string, and lifecycle events are emitted as structured fields on
//! ordinary `tracing` events so that any `tracing-subscriber` layer (human
//! readable, JSON, or otherwise) can consume them.
//!
//! The profiler event stream described in the runtime's error-handling
//! design is emitted the same way, under the `smx::profiler` target, so it
//! can be filtered independently of ordinary lifecycle logging.

use serde::Deserialize;
use std::sync::Once;
use tracing::{debug, info, warn};

/// The logging attribute carried by the root of a configuration document.
///
/// Only a level and an optional file destination are standardized; any
/// further backend-specific configuration is out of scope for the runtime
/// (see the crate-level docs on the `runtime` crate's `Config` type).
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level to emit, e.g. `"debug"`, `"info"`, `"warn"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Optional path to a log file. When absent, events go to stderr.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            path: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

static INIT: Once = Once::new();

/// Installs a process-wide `tracing` subscriber from a [`LoggingConfig`].
///
/// Idempotent: later calls are no-ops, since `tracing` only accepts one
/// global default subscriber per process and `program_init` may be called
/// at most once per run.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if let Some(path) = &config.path {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => {
                    builder.with_writer(std::sync::Mutex::new(file)).init();
                }
                Err(err) => {
                    builder.init();
                    warn!(path = %path, error = %err, "could not open log file, logging to stderr");
                }
            }
        } else {
            builder.init();
        }
    });
}

/// A net or channel's log category: a stable `tracing` target string.
///
/// Cloning a category is cheap (a `String` clone) so that a channel's two
/// ends, and a net and its box, can each hold their own copy.
#[derive(Debug, Clone)]
pub struct Category {
    target: String,
}

impl Category {
    /// Builds a category name of the form `smx::<kind>::<name>`.
    pub fn new(kind: &str, name: &str) -> Self {
        Category {
            target: format!("smx::{kind}::{name}"),
        }
    }

    /// The raw target string, for callers that want to pass it to `tracing`
    /// directly (e.g. span construction at a call site).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Logs a lifecycle event at info level: init, start, termination.
    pub fn lifecycle(&self, event: &str) {
        info!(target: "smx::lifecycle", category = %self.target, event, "net lifecycle event");
    }

    /// Logs a per-iteration debug event (step taken, message read/written).
    pub fn debug_event(&self, event: &str) {
        debug!(target: "smx::iteration", category = %self.target, event, "net iteration event");
    }

    /// Logs a channel-level warning (deadline miss, discarded message).
    pub fn warn_event(&self, event: &str) {
        warn!(target: "smx::channel", category = %self.target, event, "channel condition");
    }
}

/// A single profiler event forwarded on the profiler side-channel.
///
/// The wire format of the message payload that rides alongside a profiler
/// event is deliberately unspecified (see `runtime`'s profiler box); this
/// structured event is purely the *logging* record of the occurrence, kept
/// separate from the payload itself.
#[derive(Debug, Clone)]
pub struct ProfilerEvent {
    pub net: String,
    pub kind: ProfilerEventKind,
}

/// Kinds of profiler event emitted by the net driver around a box's `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerEventKind {
    Start,
    End,
}

/// Emits a [`ProfilerEvent`] under the dedicated `smx::profiler` target.
pub fn profiler_event(event: &ProfilerEvent) {
    debug!(target: "smx::profiler", net = %event.net, kind = ?event.kind, "profiler event");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_target_is_namespaced() {
        let cat = Category::new("net", "producer");
        assert_eq!(cat.target(), "smx::net::producer");
    }

    #[test]
    fn logging_config_defaults_to_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.path.is_none());
    }
}
