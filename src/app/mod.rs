pub mod assistant;
pub mod checks;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod optimize;
pub mod profile;
pub mod tasks;
pub mod tools;
