pub mod adapters;
pub mod common;
