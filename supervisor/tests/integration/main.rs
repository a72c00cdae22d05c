//! Integration tests for the gateway-supervisor binary
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! They are slower and should be run separately from unit tests.
