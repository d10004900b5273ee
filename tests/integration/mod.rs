//! Integration tests for gram-replay
//!
//! These tests drive several components together: cassette playback through a
//! runtime, and marker extraction into the sub-agent tree.

#[path = "../common/mod.rs"]
pub mod common;

pub mod marker_stream;
pub mod replay_flow;
