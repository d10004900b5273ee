//! Shared test utilities for gram-replay
//!
//! - Cassette fixtures
//! - A builder for scripted sub-agent events and their marker text

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
