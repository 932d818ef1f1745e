//! Outbound notifications.
//!
//! Workflows report their progress as structured events; what happens to
//! them (toast, console line, test buffer) is the sink's business.

use std::sync::Mutex;

use console::style;
use tracing::{error, info, warn};

// ============================================
// MESSAGE TEXT
// ============================================

/// Fixed notification texts shared across workflows.
pub mod messages {
    pub const PLEASE_CONNECT_WALLET: &str = "Please connect your wallet";
    pub const SWITCH_NETWORK: &str =
        "Wrong network. Switch your wallet to the configured network and retry";
    pub const TX_SUBMITTED: &str = "Transaction submitted, waiting for confirmation";
    pub const TX_SUCCESSFUL: &str = "Your transaction was successfully sent";
    pub const TX_STILL_PENDING: &str =
        "Still waiting for confirmation. You can follow the transaction on the explorer";
    pub const BALANCE_UPDATE_SOON: &str = "Your balance will update soon";
    pub const BALANCE_UPDATED: &str = "Your balance was successfully updated";
    pub const BALANCE_REFRESH_FAILED: &str =
        "Could not refresh balances, showing the previous values";
}

// ============================================
// EVENTS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Success,
    Error,
}

/// One user-visible event emitted by a workflow.
#[derive(Debug, Clone)]
pub struct Notification {
    pub severity: Severity,
    pub text: String,
    /// Raw underlying cause, kept for diagnostics.
    pub cause: Option<String>,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
            cause: None,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
            cause: None,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            text: text.into(),
            cause: None,
        }
    }

    pub fn failure(text: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
            cause: Some(cause.into()),
        }
    }
}

// ============================================
// SINKS
// ============================================

/// Receiver for workflow notifications. UI toast in the original product;
/// console or log line here.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that forwards everything to `tracing`.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info => info!("{}", n.text),
            Severity::Success => info!("✓ {}", n.text),
            Severity::Warning => warn!("{}", n.text),
            Severity::Error => match n.cause {
                Some(cause) => error!("{} ({})", n.text, cause),
                None => error!("{}", n.text),
            },
        }
    }
}

/// Sink for the interactive CLI: colored console lines.
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info => println!("  {}", style(&n.text).cyan()),
            Severity::Success => println!("  {} {}", style("✓").green(), style(&n.text).green()),
            Severity::Warning => println!("  {} {}", style("!").yellow(), style(&n.text).yellow()),
            Severity::Error => {
                println!("  {} {}", style("✗").red(), style(&n.text).red());
                if let Some(cause) = &n.cause {
                    println!("    {}", style(cause).dim());
                }
            }
        }
    }
}

/// Buffering sink used by tests to assert on emitted events.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.severity == severity)
            .count()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        self.events.lock().unwrap().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.notify(Notification::info(messages::TX_SUBMITTED));
        sink.notify(Notification::success(messages::TX_SUCCESSFUL));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Info);
        assert_eq!(events[1].severity, Severity::Success);
        assert_eq!(sink.count(Severity::Error), 0);
    }
}
