//! Resolver configuration

use crate::error::ResolveError;
use crate::utils::url::is_remote_location;
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the solver helper scripts
pub const DEFAULT_SOLVER_BASE_URL: &str = "https://github.com/kclauhk/yt-solver/raw/refs/heads/main/js";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Remote JavaScript worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRuntimeConfig {
    /// Worker URL accepting `text/plain` POST bodies
    pub endpoint: String,
    /// Pre-shared key; only its sha3-512 digest is sent
    pub api_key: String,
    /// Compress request bodies
    pub gzip: bool,
}

/// Batched challenge solver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConfig {
    pub enabled: bool,
    /// `lib.json`, whose `data.code` is the helper library
    pub lib_url: String,
    /// `yt.solver.core.js` harness
    pub core_url: String,
    /// `_hashes.json` digest manifest
    pub manifest_url: String,
    /// Where verified helper copies are kept (system temp dir when unset)
    pub cache_dir: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lib_url: format!("{}/lib.json", DEFAULT_SOLVER_BASE_URL),
            core_url: format!("{}/yt.solver.core.js", DEFAULT_SOLVER_BASE_URL),
            manifest_url: format!("{}/_hashes.json", DEFAULT_SOLVER_BASE_URL),
            cache_dir: None,
        }
    }
}

/// Immutable settings shared by every resolution call
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Engine executable, or a directory searched for `deno`/`deno.exe`
    pub js_runtime_path: Option<PathBuf>,
    /// Engine flags; deno defaults apply when unset
    pub js_runtime_args: Option<Vec<String>>,
    /// Takes precedence over the local engine when set
    pub remote_runtime: Option<RemoteRuntimeConfig>,
    /// Directory for `yt_*.dump` scratch files
    pub temp_dir: Option<PathBuf>,
    /// Per-call engine timeout
    pub execution_timeout: Duration,
    /// HTTP client timeout
    pub http_timeout: Duration,
    pub user_agent: String,
    pub solver: SolverConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            js_runtime_path: None,
            js_runtime_args: None,
            remote_runtime: None,
            temp_dir: None,
            execution_timeout: Duration::from_secs(30),
            http_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            solver: SolverConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `RYT_*` environment variables
    pub fn from_env() -> Result<Self, ResolveError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ResolveError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(location) = get("RYT_JS_RUNTIME") {
            if is_remote_location(&location) {
                config.remote_runtime = Some(RemoteRuntimeConfig {
                    endpoint: location,
                    api_key: get("RYT_JS_REMOTE_KEY").unwrap_or_default(),
                    gzip: true,
                });
            } else {
                config.js_runtime_path = Some(PathBuf::from(location));
            }
        }
        if let Some(endpoint) = get("RYT_JS_REMOTE_URL") {
            config.remote_runtime = Some(RemoteRuntimeConfig {
                endpoint,
                api_key: get("RYT_JS_REMOTE_KEY").unwrap_or_default(),
                gzip: true,
            });
        }
        if let Some(dir) = get("RYT_TEMP_DIR") {
            config.temp_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get("RYT_SOLVER_CACHE_DIR") {
            config.solver.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = get("RYT_DISABLE_SOLVER") {
            config.solver.enabled = !matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the local engine executable or search directory
    pub fn with_js_runtime(mut self, path: impl Into<PathBuf>) -> Self {
        self.js_runtime_path = Some(path.into());
        self
    }

    /// Override engine flags
    pub fn with_js_runtime_args(mut self, args: Vec<String>) -> Self {
        self.js_runtime_args = Some(args);
        self
    }

    /// Use a remote worker
    pub fn with_remote_runtime(mut self, endpoint: &str, api_key: &str) -> Self {
        self.remote_runtime = Some(RemoteRuntimeConfig {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            gzip: true,
        });
        self
    }

    /// Toggle request compression for the remote worker
    pub fn with_remote_gzip(mut self, gzip: bool) -> Self {
        if let Some(remote) = self.remote_runtime.as_mut() {
            remote.gzip = gzip;
        }
        self
    }

    /// Set scratch directory
    pub fn with_temp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(path.into());
        self
    }

    /// Set per-call engine timeout
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Set HTTP timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Enable or disable the batched solver
    pub fn with_solver(mut self, enabled: bool) -> Self {
        self.solver.enabled = enabled;
        self
    }

    /// Set the solver helper cache directory
    pub fn with_solver_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.solver.cache_dir = Some(path.into());
        self
    }

    /// Scratch directory actually used for engine input files
    pub fn effective_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<(), ResolveError> {
        if let Some(remote) = &self.remote_runtime {
            if !is_remote_location(&remote.endpoint) {
                return Err(ResolveError::ConfigError(format!(
                    "Remote runtime must be an http(s) URL: {}",
                    remote.endpoint
                )));
            }
            if remote.api_key.is_empty() {
                return Err(ResolveError::ConfigError(
                    "JS runtime error: API key required".to_string(),
                ));
            }
        }
        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(ResolveError::ConfigError(format!(
                    "{}: No such directory",
                    dir.display()
                )));
            }
        }
        if self.execution_timeout.is_zero() {
            return Err(ResolveError::ConfigError(
                "Execution timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
