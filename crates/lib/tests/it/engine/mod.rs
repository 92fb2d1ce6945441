//! Tests for the ordering engine operations.

mod concurrency;
mod delete;
mod reads;
mod reorder_many;
mod timeout;
