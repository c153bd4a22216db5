//! Command line argument parsing

use crate::core::config::ResolverConfig;
use crate::error::ResolveError;
use crate::utils::url::is_remote_location;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Resolve playable stream URLs from saved player API responses
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Player API response files (JSON); the first is the preferred client
    #[arg(value_name = "RESPONSE.json", required = true)]
    pub responses: Vec<PathBuf>,

    /// Player script file or URL (base.js)
    #[arg(short = 'p', long, value_name = "PATH|URL")]
    pub player_js: Option<String>,

    /// Expected video ID or watch URL (default: taken from the first response)
    #[arg(long, value_name = "ID")]
    pub video_id: Option<String>,

    /// Player URL quoted in warnings (default: --player-js when it is a URL)
    #[arg(long, value_name = "URL")]
    pub player_url: Option<String>,

    /// JS engine executable or directory containing deno
    #[arg(long, value_name = "PATH")]
    pub js_runtime: Option<String>,

    /// Engine flag, replacing the built-in deno flags (repeatable)
    #[arg(long = "js-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub js_args: Vec<String>,

    /// Remote JS worker URL
    #[arg(long, value_name = "URL")]
    pub remote_runtime: Option<String>,

    /// Pre-shared key for the remote worker
    #[arg(long, value_name = "KEY")]
    pub remote_key: Option<String>,

    /// Send uncompressed requests to the remote worker
    #[arg(long)]
    pub no_gzip: bool,

    /// Decode per format instead of batching through the challenge solver
    #[arg(long)]
    pub no_solver: bool,

    /// Directory for verified solver helper scripts
    #[arg(long, value_name = "DIR")]
    pub solver_cache_dir: Option<PathBuf>,

    /// JS execution and HTTP timeout (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Print resolved links as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// URL shown in per-format warnings
    pub fn effective_player_url(&self) -> String {
        self.player_url
            .clone()
            .or_else(|| {
                self.player_js
                    .clone()
                    .filter(|location| is_remote_location(location))
            })
            .unwrap_or_default()
    }

    /// Layer the flags over `base` (usually [`ResolverConfig::from_env`])
    pub fn apply_to(&self, base: ResolverConfig) -> Result<ResolverConfig, ResolveError> {
        let mut config = base
            .with_execution_timeout(self.timeout_duration())
            .with_http_timeout(self.timeout_duration());

        let key = self.remote_key.clone().unwrap_or_default();
        match (&self.remote_runtime, &self.js_runtime) {
            (Some(endpoint), _) => config = config.with_remote_runtime(endpoint, &key),
            (None, Some(location)) if is_remote_location(location) => {
                config = config.with_remote_runtime(location, &key)
            }
            (None, Some(path)) => config = config.with_js_runtime(path),
            (None, None) => {}
        }
        if self.no_gzip {
            config = config.with_remote_gzip(false);
        }
        if !self.js_args.is_empty() {
            config = config.with_js_runtime_args(self.js_args.clone());
        }
        if self.no_solver {
            config = config.with_solver(false);
        }
        if let Some(dir) = &self.solver_cache_dir {
            config = config.with_solver_cache_dir(dir);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            responses: Vec::new(),
            player_js: None,
            video_id: None,
            player_url: None,
            js_runtime: None,
            js_args: Vec::new(),
            remote_runtime: None,
            remote_key: None,
            no_gzip: false,
            no_solver: false,
            solver_cache_dir: None,
            timeout: humantime::Duration::from(Duration::from_secs(30)),
            json: false,
            verbose: false,
            quiet: false,
        }
    }
}
