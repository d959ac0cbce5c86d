pub mod config;
pub mod filter;
pub mod metrics;
pub mod time;
