//! Tests for the storage contract shared by every backend.

mod basic_operations;
