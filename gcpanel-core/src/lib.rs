pub mod models;
pub mod repository;
pub mod service;
pub mod config;
pub mod oauth2;
pub mod error;
pub mod logging;

#[cfg(test)]
pub mod test_helpers;

pub use config::Config;
pub use error::{Error, Result};
