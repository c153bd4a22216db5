//! Batched challenge solving through digest-verified helper scripts

use crate::core::config::SolverConfig;
use crate::error::ResolveError;
use crate::platform::client::fetch_text;
use crate::platform::runtime::JsRuntime;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha3::{Digest, Sha3_512};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const LIB_FILE: &str = "lib.json";
const CORE_FILE: &str = "yt.solver.core.js";

/// Decoded values keyed by the original token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolvedChallenges {
    pub n: HashMap<String, String>,
    pub sig: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct HelperScripts {
    lib: String,
    core: String,
}

#[derive(Deserialize)]
struct LibFile {
    data: LibData,
}

#[derive(Deserialize)]
struct LibData {
    code: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SolverOutput {
    Result { responses: Vec<SolverResponse> },
    Error { error: Option<String> },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SolverResponse {
    Result {
        data: HashMap<String, serde_json::Value>,
    },
    Error {
        error: Option<String>,
    },
}

/// Solves many n/sig challenges in one engine invocation
pub struct ChallengeSolver {
    runtime: Arc<JsRuntime>,
    client: Client,
    lib_url: String,
    core_url: String,
    manifest_url: String,
    cache_dir: PathBuf,
    scripts: OnceCell<HelperScripts>,
}

impl ChallengeSolver {
    pub fn new(config: &SolverConfig, client: Client, runtime: Arc<JsRuntime>) -> Self {
        Self {
            runtime,
            client,
            lib_url: config.lib_url.clone(),
            core_url: config.core_url.clone(),
            manifest_url: config.manifest_url.clone(),
            cache_dir: config.cache_dir.clone().unwrap_or_else(std::env::temp_dir),
            scripts: OnceCell::new(),
        }
    }

    /// Solve every challenge at once; any failure is logged and yields `None`
    pub async fn solve(
        &self,
        n_params: &[String],
        signatures: &[String],
        script: &str,
    ) -> Option<SolvedChallenges> {
        match self.try_solve(n_params, signatures, script).await {
            Ok(solved) => Some(solved),
            Err(e) => {
                warn!("Challenge solver failed: {}", e);
                None
            }
        }
    }

    /// Like [`solve`](Self::solve) but keeps the typed error
    pub async fn try_solve(
        &self,
        n_params: &[String],
        signatures: &[String],
        script: &str,
    ) -> Result<SolvedChallenges> {
        if !self.runtime.is_available() {
            return Err(ResolveError::RuntimeUnavailable(self.runtime.describe()));
        }

        let scripts = self
            .scripts
            .get_or_try_init(|| self.load_scripts())
            .await?;

        let request = json!({
            "type": "player",
            "player": script,
            "requests": [
                { "type": "n", "challenges": dedup(n_params) },
                { "type": "sig", "challenges": dedup(signatures) },
            ],
            "output_preprocessed": true,
        });
        let code = format!(
            "{}\nObject.assign(globalThis, lib);\n{}\nconsole.log(JSON.stringify(jsc({})));",
            scripts.lib,
            scripts.core,
            serde_json::to_string(&request)?
        );

        debug!(
            "Solving {} n and {} sig challenges in one call",
            n_params.len(),
            signatures.len()
        );
        let output = self.runtime.run_raw(&code).await?;
        parse_output(&output)
    }

    async fn load_scripts(&self) -> Result<HelperScripts> {
        let manifest_text = fetch_text(&self.client, &self.manifest_url).await?;
        let manifest: HashMap<String, String> = serde_json::from_str(&manifest_text)?;

        let lib = self.load_verified(LIB_FILE, &self.lib_url, &manifest).await?;
        let core = self.load_verified(CORE_FILE, &self.core_url, &manifest).await?;
        let lib: LibFile = serde_json::from_str(&lib)?;

        info!("Solver helper scripts ready");
        Ok(HelperScripts {
            lib: lib.data.code,
            core,
        })
    }

    /// Cached copy if its digest matches, else one fresh download that must match
    async fn load_verified(
        &self,
        name: &str,
        url: &str,
        manifest: &HashMap<String, String>,
    ) -> Result<String> {
        let expected = manifest.get(name).ok_or_else(|| {
            ResolveError::VerificationFailure(format!("No published digest for {}", name))
        })?;
        let path = self.cache_dir.join(cache_file_name(name));

        if let Ok(cached) = tokio::fs::read_to_string(&path).await {
            match verify(name, &cached, expected) {
                Ok(()) => {
                    debug!("Using cached {}", path.display());
                    return Ok(cached);
                }
                Err(e) => warn!("{}; downloading a fresh copy", e),
            }
        }

        let fresh = fetch_text(&self.client, url).await?;
        verify(name, &fresh, expected)?;
        store(&self.cache_dir, &path, &fresh)?;
        debug!("Cached {} at {}", name, path.display());
        Ok(fresh)
    }
}

fn cache_file_name(name: &str) -> String {
    match name {
        LIB_FILE => "yt.lib.json".to_string(),
        other => other.to_string(),
    }
}

fn verify(name: &str, content: &str, expected: &str) -> Result<()> {
    let actual = hex::encode(Sha3_512::digest(content.as_bytes()));
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(ResolveError::VerificationFailure(format!(
            "{} does not match its published digest",
            name
        )))
    }
}

/// Write through a sibling temp file and rename into place
fn store(dir: &Path, path: &Path, content: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|e| ResolveError::IoError(e.error))?;
    Ok(())
}

fn dedup(values: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(String::as_str)
        .filter(|value| seen.insert(*value))
        .collect()
}

fn parse_output(output: &str) -> Result<SolvedChallenges> {
    let unexpected = |detail: &str| {
        ResolveError::ExecutionFailure(format!("Unexpected solver response: {}", detail))
    };

    let responses = match serde_json::from_str::<SolverOutput>(output)
        .map_err(|e| unexpected(&e.to_string()))?
    {
        SolverOutput::Result { responses } => responses,
        SolverOutput::Error { error } => {
            return Err(unexpected(error.as_deref().unwrap_or("error")));
        }
    };

    let mut maps = responses.into_iter().map(|response| match response {
        SolverResponse::Result { data } => Ok(data
            .into_iter()
            .filter_map(|(token, value)| value.as_str().map(|v| (token, v.to_string())))
            .collect::<HashMap<_, _>>()),
        SolverResponse::Error { error } => Err(unexpected(error.as_deref().unwrap_or("error"))),
    });

    let n = maps.next().ok_or_else(|| unexpected("missing n response"))??;
    let sig = maps.next().ok_or_else(|| unexpected("missing sig response"))??;
    Ok(SolvedChallenges { n, sig })
}
