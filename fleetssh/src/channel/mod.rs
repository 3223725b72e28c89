//! Channel layer: response accumulation and terminator detection.

mod buffer;

pub use buffer::{ResponseBuffer, contains, split_lines};
