//! File I/O for city models and shadow results.

pub mod cityjson;
pub mod results;

pub use cityjson::{from_cityjson_str, read_cityjson};
pub use results::write_results_json;
