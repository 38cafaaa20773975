//! Structured logging
//!
//! `init` installs the tracing subscriber once per process. Components receive a
//! [`Logger`] carrying their name instead of reaching for a global.

use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_env("FAIRGATE_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()
    };

    // Already initialised (tests, embedding callers)
    let _ = result;
}

/// Severity levels exposed to components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
    /// An error that needs operator attention
    Critical,
}

/// Component-scoped logger
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    component: &'static str,
}

impl Logger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn info(&self, message: &str, payload: Option<&Value>) {
        self.log(Severity::Info, message, payload);
    }

    pub fn warn(&self, message: &str, payload: Option<&Value>) {
        self.log(Severity::Warn, message, payload);
    }

    pub fn error(&self, message: &str, payload: Option<&Value>) {
        self.log(Severity::Error, message, payload);
    }

    pub fn critical(&self, message: &str, payload: Option<&Value>) {
        self.log(Severity::Critical, message, payload);
    }

    /// Emit a record; the payload, when present, is attached as a JSON field
    pub fn log(&self, severity: Severity, message: &str, payload: Option<&Value>) {
        let component = self.component;
        let payload = payload.map(Value::to_string).unwrap_or_default();

        match severity {
            Severity::Info => {
                tracing::info!(component = component, payload = %payload, "{}", message)
            }
            Severity::Warn => {
                tracing::warn!(component = component, payload = %payload, "{}", message)
            }
            Severity::Error => {
                tracing::error!(component = component, payload = %payload, "{}", message)
            }
            Severity::Critical => tracing::error!(
                component = component,
                payload = %payload,
                critical = true,
                "{}",
                message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_logger_accepts_payloads_without_subscriber() {
        let logger = Logger::new("test");
        logger.info("plain", None);
        logger.warn("with payload", Some(&json!({"login": "octocat"})));
        logger.critical("still fine", None);
        assert_eq!(logger.component(), "test");
    }
}
