//! Core functionality for ryt-resolve

pub mod config;
pub mod format;
pub mod resolver;

pub use config::*;
pub use format::*;
pub use resolver::*;
