//! Integration tests for arb-bot.
//!
//! These tests run the full application wiring against local mock
//! exchange servers: connection lifecycle, frame normalization, and
//! opportunity detection end to end.

pub mod common;
