//! Unit tests for the gateway supervisor
//!
//! These tests drive the services against a simulated isolated environment
//! and run fast without external I/O.

mod config_safeguard;
mod helpers;
