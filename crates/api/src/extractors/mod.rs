//! Request extractors whose rejections use the API's JSON error body.

mod rejecting;

pub use rejecting::{ApiJson, ApiPath, ApiQuery};
