pub mod cli;
pub mod config;
pub mod decision;
pub mod detector;
pub mod error;
pub mod inference;
pub mod init;
pub mod labels;
pub mod report;
pub mod service;

pub use error::LarkError;
