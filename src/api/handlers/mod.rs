//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Agent listing handlers.
pub mod agents;
/// Circuit breaker inspection and reset handlers.
pub mod circuits;
/// Health check handler.
pub mod health;
/// Request processing and planning handlers.
pub mod process;
