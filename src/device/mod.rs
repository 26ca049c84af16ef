pub mod backend;
pub mod btle;
pub mod connection;
pub mod constants;
pub mod types;
