//! Core library for the agent board editor
//!
//! This crate contains the client-side half of the agent wire protocol:
//! - Segment model (text / asset / input / tool)
//! - Template parts and parameter values
//! - Segment resolution with aggregated placeholder errors
//! - Feature flags and derived capability flags

pub mod error;
pub mod flags;
pub mod resolve;
pub mod segment;
pub mod template;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
