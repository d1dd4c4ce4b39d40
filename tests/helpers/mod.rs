//! Shared helpers for integration tests
//!
//! - `fixtures`: timestamps and captures
//! - `faulty_store`: a `CaptureStore` wrapper that injects races, failures
//!   and stalls

#![allow(dead_code)]

pub mod faulty_store;
pub mod fixtures;
