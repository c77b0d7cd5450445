#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

//! Composable technical indicators built on decimal arithmetic.

/// Foundational traits and shared abstractions.
pub mod core;
/// Built-in indicator implementations.
pub mod indicators;

/// Re-export of the core traits and error type to make the crate easy to consume.
pub use crate::core::{Indicator, IndicatorError, Input};
