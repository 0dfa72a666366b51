//! # relay-core
//!
//! Core types, traits, configuration, and error handling for the relay gateway.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod traits;

pub use config::shellexpand;
