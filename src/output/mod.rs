//! Presentation of finished results. Nothing here reads system state.

pub mod candidates;
pub mod json;
pub mod text;
pub mod tree;
