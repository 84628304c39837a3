// Logging utilities for the E-IMZO signing bridge
//
// This module provides a small logging layer with:
// - Component-based categorization
// - Context label tracking through logger inheritance
// - Level-gated delegation to the `log` macros

use log::{debug, error, info, warn};

/// Predefined components for logging categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Bridge,
    Transport,
    CertStore,
    Signer,
    Flow,
    Http,
    Custom(&'static str),
}

impl Component {
    /// Get the string representation of the component
    pub fn as_str(&self) -> &str {
        match self {
            Component::Bridge => "Bridge",
            Component::Transport => "Transport",
            Component::CertStore => "CertStore",
            Component::Signer => "Signer",
            Component::Flow => "Flow",
            Component::Http => "Http",
            Component::Custom(name) => name,
        }
    }
}

/// A helper for creating component-specific loggers with a shared context label
#[derive(Clone)]
pub struct Logger {
    /// Component this logger is for
    component: Component,
    /// Context label carried by every line (e.g. a session or bridge id)
    context: String,
    /// Parent component for hierarchical logging (if any)
    parent_component: Option<Component>,
}

impl Logger {
    /// Create a new root logger for a specific component and context label.
    /// This should only be called by the owning root component.
    pub fn new_root(component: Component, context: &str) -> Self {
        Self {
            component,
            context: context.to_string(),
            parent_component: None,
        }
    }

    /// Create a child logger with the same context but a different component.
    /// This is the preferred way to create loggers in sub-components.
    pub fn with_component(&self, component: Component) -> Self {
        Self {
            component,
            context: self.context.clone(),
            parent_component: Some(self.component),
        }
    }

    /// Get a reference to the context label
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Get the component prefix for logging, including parent if available
    fn component_prefix(&self) -> String {
        match self.parent_component {
            Some(parent) if parent != Component::Bridge => {
                format!("{}.{}", parent.as_str(), self.component.as_str())
            }
            _ => self.component.as_str().to_string(),
        }
    }

    /// Log a debug message
    pub fn debug(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "[{}][{}] {}",
                self.context,
                self.component_prefix(),
                message.into()
            );
        }
    }

    /// Log an info message
    pub fn info(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Info) {
            info!(
                "[{}][{}] {}",
                self.context,
                self.component_prefix(),
                message.into()
            );
        }
    }

    /// Log a warning message
    pub fn warn(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Warn) {
            warn!(
                "[{}][{}] {}",
                self.context,
                self.component_prefix(),
                message.into()
            );
        }
    }

    /// Log an error message
    pub fn error(&self, message: impl Into<String>) {
        if log::log_enabled!(log::Level::Error) {
            error!(
                "[{}][{}] {}",
                self.context,
                self.component_prefix(),
                message.into()
            );
        }
    }
}
