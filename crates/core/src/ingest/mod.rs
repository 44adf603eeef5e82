pub mod error;
pub mod fetcher;
pub mod provider;
pub mod types;
