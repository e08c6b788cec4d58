//! Domain models for podid.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod credential;
pub mod identity;
pub mod reset_token;
pub mod revocation;
pub mod session;
pub mod user;
