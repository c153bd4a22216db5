//! Player script decoding and stream link resolution

pub mod cipher;
pub mod client;
pub mod extractor;
pub mod formats;
pub mod innertube;
pub mod interpreter;
pub mod links;
pub mod runtime;
pub mod solver;

pub use cipher::*;
pub use client::*;
pub use extractor::*;
pub use formats::*;
pub use innertube::*;
pub use interpreter::*;
pub use links::*;
pub use runtime::*;
pub use solver::*;
