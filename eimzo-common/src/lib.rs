//! Eimzo Common
//!
//! Shared utilities for the E-IMZO signing bridge crates.
//!
//! This crate provides:
//! - Component-based structured logging with a session context label

pub mod logging;

pub use logging::{Component, Logger};
