//! Abstract syntax tree for shell command units.

pub mod types;

pub use types::*;
