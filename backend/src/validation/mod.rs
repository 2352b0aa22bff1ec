//! Validation rules for request payloads.
//!
//! Payload structs derive `validator::Validate` and point their fields at the
//! custom rules in [`rules`], so handlers reject bad input before the
//! lifecycle service is ever called.

pub mod rules;

pub use validator::Validate;
