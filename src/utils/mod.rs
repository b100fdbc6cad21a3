//! Utility functions and helpers.

pub mod logging;
pub mod paths;

pub use paths::{absolutize, expand_home, find_executable};
