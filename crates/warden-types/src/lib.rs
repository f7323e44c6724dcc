//! Shared types and error definitions for Warden.
//!
//! Kept apart from `warden-core` so host integrations can name client ids,
//! outcome records and errors without pulling in the actor runtime.

#![forbid(unsafe_code)]

pub mod error;
pub mod prelude;
pub mod types;

// vim: ts=4
