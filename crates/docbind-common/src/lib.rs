//! Common utilities for docbind
//!
//! This crate provides the error taxonomy and error-message sanitization
//! shared by the docbind driver crates.

pub mod error;
pub mod sanitize;

pub use error::{DocBindError, Result};
pub use sanitize::{categorize_error, sanitize_error, ErrorCategory};
