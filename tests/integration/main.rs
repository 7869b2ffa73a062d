//! Integration tests driving the full service stack over in-memory backends.

mod bin_test;
mod drive_test;
mod helpers;
