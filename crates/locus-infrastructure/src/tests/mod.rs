//! Tests for crate-private run-level bookkeeping
