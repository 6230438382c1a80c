pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod search;
pub mod tasks;
pub mod time;
pub mod validation;

pub use error::{Error, Result};
