//! Git LFS request handlers.

pub mod object;
