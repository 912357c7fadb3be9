pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod topology;
pub mod utils;

#[cfg(test)]
mod test_utils;
