//! Utility functions for ryt-resolve

pub mod cache;
pub mod itag;
pub mod mime;
pub mod url;

pub use cache::*;
pub use itag::*;
pub use mime::*;
pub use url::*;
