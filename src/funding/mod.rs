pub mod cache;
pub mod exchanges;
pub mod monitor;
pub mod parse;
pub mod types;
