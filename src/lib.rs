pub mod api;
pub mod backend;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod geo;
pub mod geocoding;
pub mod models;
pub mod observability;
pub mod state;

#[cfg(test)]
mod testing;
