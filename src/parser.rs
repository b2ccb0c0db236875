//! Log line decoding.
//!
//! - [`ansi`] strips terminal escape sequences
//! - [`tokenizer`] splits a physical line into timestamp and content
//! - [`lines`] splits a byte stream into size-capped physical lines
//! - [`session`] tracks the enclosing group across the lines of one parse

pub mod ansi;
pub mod lines;
pub mod session;
pub mod tokenizer;

pub use ansi::{strip_ansi, strip_ansi_bytes};
pub use lines::LineSplitter;
pub use session::{parse_reader, Entries, GroupTracker};
pub use tokenizer::{is_group_header, tokenize, ParsedEntry};
