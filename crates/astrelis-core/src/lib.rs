//! Astrelis Core
//!
//! This crate contains the core utilities shared by the Astrelis engine crates.

pub mod collections;
pub mod logging;
pub mod profiling;
pub mod time;
