//! Authentication primitives.
//!
//! Login and registration live in a separate service; this crate only
//! validates the bearer tokens it issues.
//!
//! - [`jwt`] -- access-token generation and validation.

pub mod jwt;
