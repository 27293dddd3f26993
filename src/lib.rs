//! axsaudit library exports.
//!
//! The binary is a thin clap front end; everything it does is reachable
//! from here so integration tests can drive scans directly.

pub mod access;
pub mod commands;
pub mod config;
pub mod findings;
pub mod identity;
pub mod report;
pub mod scan;
pub mod timing;
