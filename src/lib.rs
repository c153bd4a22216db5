//! # ryt-resolve
//!
//! Rebuilds playable stream URLs from player API responses by decoding the
//! signature and n-parameter challenges embedded in the player script.
//!
//! ## Features
//!
//! - Function extraction from minified player scripts
//! - Native decoding of the swap/splice/reverse transform class
//! - Local (deno), remote worker and embedded V8 execution for the rest
//! - Batched challenge solving with digest-verified helper scripts
//! - Multi-client format merging and ranking
//!
//! ## Example
//!
//! ```rust,no_run
//! use ryt_resolve::{PlayerResponse, Resolver, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Resolver::new(ResolverConfig::from_env()?).await?;
//!     let script = resolver
//!         .fetch_player_script("https://www.youtube.com/s/player/0004de42/player_ias.vflset/en_US/base.js")
//!         .await?;
//!     let response = PlayerResponse::from_json(&std::fs::read_to_string("web.json")?)?;
//!
//!     let links = resolver
//!         .resolve_clients(&[response], "dQw4w9WgXcQ", Some(script.as_str()), "")
//!         .await?;
//!     for format in &links.formats {
//!         println!("{} {:?}", format.itag, format.url);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use core::{ResolvedLinks, Resolver, ResolverConfig, StreamFormat};
pub use error::ResolveError;
pub use platform::{Cipher, PlayerResponse, RawFormat, TransformKind};

/// Result type alias for ryt-resolve operations
pub type Result<T> = std::result::Result<T, ResolveError>;
