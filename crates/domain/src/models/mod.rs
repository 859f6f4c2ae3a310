//! Domain models.

pub mod evaluation;
pub mod feature_flag;

pub use evaluation::*;
pub use feature_flag::*;
