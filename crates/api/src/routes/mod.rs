//! HTTP route handlers.

pub mod evaluation;
pub mod flags;
pub mod health;
