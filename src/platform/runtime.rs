//! Execution bridge to an external JavaScript engine

use crate::core::config::{RemoteRuntimeConfig, ResolverConfig};
use crate::error::ResolveError;
use crate::platform::extractor::TransformKind;
use crate::Result;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use sha3::{Digest, Sha3_512};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Flags passed to deno when none are configured
pub const DENO_ARGS: &[&str] = &[
    "--ext=js",
    "--no-code-cache",
    "--no-prompt",
    "--no-remote",
    "--no-lock",
    "--node-modules-dir=none",
    "--no-config",
];

const PROBE_CODE: &str = r#"decodeURIComponent("%3Fx%3Dtest")"#;
const PROBE_ANSWER: &str = "?x=test";

/// Something that can evaluate a script and report what it printed last
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Run `code` and return the last non-empty line of its output
    async fn execute(&self, code: &str) -> Result<String>;

    /// Engine name and version for diagnostics
    fn describe(&self) -> String;
}

/// Local engine executable fed through a scratch file
pub struct LocalEngine {
    path: PathBuf,
    version: String,
    args: Vec<String>,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl LocalEngine {
    /// Probe `path` for its version and pick the flag set
    pub async fn new(
        path: PathBuf,
        args: Option<Vec<String>>,
        temp_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self> {
        let output = tokio::time::timeout(
            timeout.max(Duration::from_secs(10)),
            Command::new(&path)
                .arg("-v")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            ResolveError::RuntimeUnavailable(format!("Failed to run \"{}\"", path.display()))
        })?
        .map_err(|e| {
            ResolveError::RuntimeUnavailable(format!("Failed to run \"{}\": {}", path.display(), e))
        })?;

        let version = last_line(&String::from_utf8_lossy(&output.stdout));
        let args = args.unwrap_or_else(|| {
            if version.starts_with("deno") {
                DENO_ARGS.iter().map(|s| s.to_string()).collect()
            } else {
                Vec::new()
            }
        });

        info!("Using JS runtime {} ({})", path.display(), version);

        Ok(Self {
            path,
            version,
            args,
            temp_dir,
            timeout,
        })
    }

    /// Version string reported by `<engine> -v`
    pub fn version(&self) -> &str {
        &self.version
    }

    fn engine_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[async_trait]
impl ScriptExecutor for LocalEngine {
    async fn execute(&self, code: &str) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("yt_")
            .suffix(".dump")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| {
                ResolveError::ExecutionFailure(format!(
                    "Failed to create files in {}: {}",
                    self.temp_dir.display(),
                    e
                ))
            })?;
        file.write_all(code.as_bytes())?;
        file.flush()?;

        debug!(
            "Running {} {} {}",
            self.engine_name(),
            self.args.join(" "),
            file.path().display()
        );

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.path)
                .args(&self.args)
                .arg(file.path())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            ResolveError::ExecutionFailure(format!(
                "Timed out after {} ({})",
                humantime::format_duration(self.timeout),
                self.describe()
            ))
        })?
        .map_err(|e| {
            ResolveError::ExecutionFailure(format!("Failed to run {}: {}", self.describe(), e))
        })?;

        if !output.status.success() {
            let status = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            debug!("Engine stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
            return Err(ResolveError::ExecutionFailure(format!(
                "Exit status {} ({})",
                status,
                self.describe()
            )));
        }

        Ok(last_line(&String::from_utf8_lossy(&output.stdout)))
    }

    fn describe(&self) -> String {
        format!("'{} {}'", self.engine_name(), self.version)
    }
}

/// Remote worker that evaluates POSTed source
pub struct RemoteEngine {
    client: Client,
    endpoint: String,
    token: String,
    gzip: bool,
    probe: OnceCell<std::result::Result<(), String>>,
}

impl RemoteEngine {
    pub fn new(client: Client, config: &RemoteRuntimeConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            token: token_for(&config.api_key),
            gzip: config.gzip,
            probe: OnceCell::new(),
        }
    }

    /// Issue the liveness probe once; later calls reuse its outcome
    pub async fn ensure_alive(&self) -> Result<()> {
        let outcome = self
            .probe
            .get_or_init(|| async {
                match self.post(PROBE_CODE, false).await {
                    Ok(answer) if answer == PROBE_ANSWER => {
                        info!("Remote JS runtime {} is alive", self.endpoint);
                        Ok(())
                    }
                    Ok(answer) => Err(format!("JS runtime error: unexpected probe answer '{}'", answer)),
                    Err(e) => Err(format!("JS runtime error: {}", e)),
                }
            })
            .await;

        outcome
            .clone()
            .map_err(ResolveError::RuntimeUnavailable)
    }

    async fn post(&self, code: &str, gzip: bool) -> Result<String> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/plain")
            .header("X-Token", &self.token);

        let body = if gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
            let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(code.as_bytes())?;
            encoder.finish()?
        } else {
            code.as_bytes().to_vec()
        };

        let response = request.body(body).send().await.map_err(|e| {
            ResolveError::ExecutionFailure(format!("Status 'no response' ({})", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::ExecutionFailure(format!("Status '{}'", status)));
        }

        let compressed = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
        let bytes = response.bytes().await?;

        let text = if compressed {
            let mut decoded = String::new();
            GzDecoder::new(bytes.as_ref())
                .read_to_string(&mut decoded)
                .map_err(|e| {
                    ResolveError::ExecutionFailure(format!("Invalid gzip response: {}", e))
                })?;
            decoded
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(last_line(&text))
    }
}

#[async_trait]
impl ScriptExecutor for RemoteEngine {
    async fn execute(&self, code: &str) -> Result<String> {
        self.ensure_alive().await?;
        self.post(code, self.gzip).await
    }

    fn describe(&self) -> String {
        format!("'{} (remote)'", self.endpoint)
    }
}

/// In-process V8 isolate
#[cfg(feature = "embedded-js")]
pub struct EmbeddedEngine {
    timeout: Duration,
}

#[cfg(feature = "embedded-js")]
impl EmbeddedEngine {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run_blocking(code: String) -> Result<String> {
        use deno_core::{FastString, JsRuntime, RuntimeOptions};

        let mut runtime = JsRuntime::new(RuntimeOptions::default());
        let shim = "globalThis.__out=[];globalThis.console={log:(...a)=>globalThis.__out.push(a.join(' '))};";

        runtime
            .execute_script("<shim>", FastString::from(shim.to_string()))
            .map_err(|e| ResolveError::ExecutionFailure(format!("Embedded runtime error: {:?}", e)))?;
        runtime
            .execute_script("<code>", FastString::from(code))
            .map_err(|e| ResolveError::ExecutionFailure(format!("Embedded runtime error: {:?}", e)))?;
        let result = runtime
            .execute_script(
                "<output>",
                FastString::from("globalThis.__out.join('\\n')".to_string()),
            )
            .map_err(|e| ResolveError::ExecutionFailure(format!("Embedded runtime error: {:?}", e)))?;

        let scope = &mut runtime.handle_scope();
        let local_value = result.open(scope);
        Ok(last_line(&local_value.to_rust_string_lossy(scope)))
    }
}

#[cfg(feature = "embedded-js")]
#[async_trait]
impl ScriptExecutor for EmbeddedEngine {
    async fn execute(&self, code: &str) -> Result<String> {
        let code = code.to_string();
        let task = tokio::task::spawn_blocking(move || Self::run_blocking(code));
        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| ResolveError::ExecutionFailure("Embedded runtime timed out".to_string()))?
            .map_err(|e| ResolveError::ExecutionFailure(format!("Embedded runtime panicked: {}", e)))?
    }

    fn describe(&self) -> String {
        "'v8 (embedded)'".to_string()
    }
}

/// Hex sha3-512 of the worker key, sent as `X-Token`
pub fn token_for(api_key: &str) -> String {
    hex::encode(Sha3_512::digest(api_key.as_bytes()))
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Substitute `%s` placeholders in order
pub fn render_template(template: &str, args: &[&str]) -> Result<String> {
    let pieces: Vec<&str> = template.split("%s").collect();
    if pieces.len() - 1 != args.len() {
        return Err(ResolveError::ExecutionFailure(format!(
            "Function code error (template expects {} arguments, got {})",
            pieces.len() - 1,
            args.len()
        )));
    }

    let mut code = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    for (idx, piece) in pieces.iter().enumerate() {
        code.push_str(piece);
        if let Some(arg) = args.get(idx) {
            code.push_str(arg);
        }
    }
    Ok(code)
}

/// Find an engine binary from the configured path or next to the running executable
pub fn locate_local_engine(configured: Option<&Path>) -> Result<PathBuf> {
    let adjacent = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    match configured {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) if path.is_dir() => search_dir(path)
            .or_else(|| adjacent.as_deref().and_then(search_dir))
            .ok_or_else(|| ResolveError::RuntimeUnavailable("Deno not found".to_string())),
        Some(path) => Err(ResolveError::RuntimeUnavailable(format!(
            "JS runtime not found: invalid path \"{}\"",
            path.display()
        ))),
        None => adjacent
            .as_deref()
            .and_then(search_dir)
            .ok_or_else(|| ResolveError::RuntimeUnavailable("Deno not found".to_string())),
    }
}

fn search_dir(dir: &Path) -> Option<PathBuf> {
    ["deno.exe", "deno"]
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Entry point used by decoders: one configured executor, or the reason there is none
pub struct JsRuntime {
    executor: Option<Arc<dyn ScriptExecutor>>,
    unavailable: String,
}

impl JsRuntime {
    /// Resolve the execution target: remote worker, then local engine, then embedded V8
    pub async fn from_config(config: &ResolverConfig, remote_client: Client) -> Self {
        if let Some(remote) = &config.remote_runtime {
            debug!("Configuring remote JS runtime {}", remote.endpoint);
            return Self::with_executor(Arc::new(RemoteEngine::new(remote_client, remote)));
        }

        let local = match locate_local_engine(config.js_runtime_path.as_deref()) {
            Ok(path) => {
                LocalEngine::new(
                    path,
                    config.js_runtime_args.clone(),
                    config.effective_temp_dir(),
                    config.execution_timeout,
                )
                .await
            }
            Err(e) => Err(e),
        };

        match local {
            Ok(engine) => Self::with_executor(Arc::new(engine)),
            Err(e) => {
                #[cfg(feature = "embedded-js")]
                {
                    debug!("{}; falling back to embedded V8", e);
                    Self::with_executor(Arc::new(EmbeddedEngine::new(config.execution_timeout)))
                }
                #[cfg(not(feature = "embedded-js"))]
                {
                    warn!("No JS runtime available: {}", e);
                    Self::unavailable(&e.to_string())
                }
            }
        }
    }

    pub fn with_executor(executor: Arc<dyn ScriptExecutor>) -> Self {
        Self {
            executor: Some(executor),
            unavailable: String::new(),
        }
    }

    /// A runtime whose every call fails with `RuntimeUnavailable(reason)`
    pub fn unavailable(reason: &str) -> Self {
        Self {
            executor: None,
            unavailable: reason.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.executor.is_some()
    }

    pub fn describe(&self) -> String {
        match &self.executor {
            Some(executor) => executor.describe(),
            None => format!("unavailable ({})", self.unavailable),
        }
    }

    fn executor(&self) -> Result<&Arc<dyn ScriptExecutor>> {
        self.executor.as_ref().ok_or_else(|| {
            ResolveError::RuntimeUnavailable(if self.unavailable.is_empty() {
                "JS runtime not available".to_string()
            } else {
                self.unavailable.clone()
            })
        })
    }

    /// Render `template` with `args`, run it and validate the printed value.
    ///
    /// Empty output, or output equal to `original`, is an `ExecutionFailure`.
    pub async fn run(
        &self,
        kind: TransformKind,
        template: &str,
        args: &[&str],
        original: &str,
    ) -> Result<String> {
        let executor = self.executor()?;
        let code = render_template(template, args)?;
        let output = executor.execute(&code).await?;

        if output.is_empty() || output == original {
            let func = args
                .get(1)
                .map(|name| format!("func:'{}' ", name.chars().take(20).collect::<String>()))
                .unwrap_or_default();
            return Err(ResolveError::ExecutionFailure(format!(
                "Failed to solve {} ({}{})",
                kind,
                func,
                executor.describe()
            )));
        }

        Ok(output)
    }

    /// Run prepared source; only empty output is rejected
    pub async fn run_raw(&self, code: &str) -> Result<String> {
        let executor = self.executor()?;
        let output = executor.execute(code).await?;
        if output.is_empty() {
            return Err(ResolveError::ExecutionFailure(format!(
                "Failed to solve JS challenges ({})",
                executor.describe()
            )));
        }
        Ok(output)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Executor returning canned output and recording what it was given
    pub(crate) struct MockExecutor {
        outputs: Mutex<Vec<Result<String>>>,
        pub(crate) calls: AtomicUsize,
        pub(crate) last_code: Mutex<String>,
    }

    impl MockExecutor {
        pub(crate) fn new(outputs: Vec<Result<String>>) -> Self {
            Self {
                outputs: Mutex::new(outputs),
                calls: AtomicUsize::new(0),
                last_code: Mutex::new(String::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScriptExecutor for MockExecutor {
        async fn execute(&self, code: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_code.lock().unwrap() = code.to_string();
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.len() > 1 {
                outputs.remove(0)
            } else {
                match outputs.first() {
                    Some(Ok(out)) => Ok(out.clone()),
                    Some(Err(e)) => Err(ResolveError::from_shared(e)),
                    None => Ok(String::new()),
                }
            }
        }

        fn describe(&self) -> String {
            "'mock 1.0'".to_string()
        }
    }

    #[test]
    fn test_render_template() {
        let code = render_template("%s\nconsole.log(%s(%s));", &["var f=1;", "f", "\"x\""]).unwrap();
        assert_eq!(code, "var f=1;\nconsole.log(f(\"x\"));");

        let mismatch = render_template("%s(%s)", &["f"]);
        assert!(matches!(mismatch, Err(ResolveError::ExecutionFailure(_))));
    }

    #[test]
    fn test_token_is_sha3_512_hex() {
        let token = token_for("secret");
        assert_eq!(token.len(), 128);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, token_for("other"));
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("warn\nresult  \n\n"), "result");
        assert_eq!(last_line(""), "");
    }

    #[test]
    fn test_invalid_configured_path() {
        let result = locate_local_engine(Some(Path::new("/definitely/not/a/deno")));
        assert!(matches!(result, Err(ResolveError::RuntimeUnavailable(_))));
    }

    #[tokio::test]
    async fn test_run_rejects_unchanged_output() {
        let runtime = JsRuntime::with_executor(Arc::new(MockExecutor::new(vec![Ok("abc".into())])));
        let result = runtime
            .run(TransformKind::N, "%s;console.log(%s(%s))", &["", "fn", "\"abc\""], "abc")
            .await;
        assert!(matches!(result, Err(ResolveError::ExecutionFailure(m)) if m.contains("Failed to solve n")));
    }

    #[tokio::test]
    async fn test_run_rejects_empty_output() {
        let runtime = JsRuntime::with_executor(Arc::new(MockExecutor::new(vec![Ok(String::new())])));
        let result = runtime.run(TransformKind::Signature, "%s", &["x"], "abc").await;
        assert!(matches!(result, Err(ResolveError::ExecutionFailure(_))));
    }

    #[tokio::test]
    async fn test_unavailable_runtime() {
        let runtime = JsRuntime::unavailable("Deno not found");
        assert!(!runtime.is_available());
        let result = runtime.run(TransformKind::N, "%s", &["x"], "abc").await;
        assert!(matches!(result, Err(ResolveError::RuntimeUnavailable(m)) if m == "Deno not found"));
    }

    #[cfg(unix)]
    mod local {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        const FAKE_ENGINE: &str = r#"#!/bin/sh
if [ "$1" = "-v" ]; then
  echo "deno 1.46.0"
  exit 0
fi
for last; do :; done
grep -q '^//SLEEP' "$last" && sleep 5
sed -n 's#^//OUT ##p' "$last"
grep -q '^//FAIL' "$last" && exit 3
exit 0
"#;

        fn install_fake_engine(dir: &Path) -> PathBuf {
            let path = dir.join("deno");
            std::fs::write(&path, FAKE_ENGINE).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        async fn runtime_in(bin: &Path, scratch: &Path, timeout: Duration) -> JsRuntime {
            let config = ResolverConfig::new()
                .with_js_runtime(bin)
                .with_temp_dir(scratch)
                .with_execution_timeout(timeout);
            JsRuntime::from_config(&config, Client::new()).await
        }

        #[tokio::test]
        async fn test_local_engine_from_directory() {
            let bin = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            install_fake_engine(bin.path());

            let runtime = runtime_in(bin.path(), scratch.path(), Duration::from_secs(10)).await;
            assert!(runtime.is_available());
            assert!(runtime.describe().contains("deno 1.46.0"));

            let output = runtime
                .run(TransformKind::N, "%s\n//OUT %s", &["//OUT first", "second"], "abc")
                .await
                .unwrap();
            assert_eq!(output, "second");
            assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn test_local_engine_applies_deno_flags() {
            let bin = tempfile::tempdir().unwrap();
            let path = install_fake_engine(bin.path());

            let engine = LocalEngine::new(path, None, std::env::temp_dir(), Duration::from_secs(10))
                .await
                .unwrap();
            assert_eq!(engine.version(), "deno 1.46.0");
            assert_eq!(engine.args, DENO_ARGS);
        }

        #[tokio::test]
        async fn test_local_engine_exit_status() {
            let bin = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            let path = install_fake_engine(bin.path());

            let runtime = runtime_in(&path, scratch.path(), Duration::from_secs(10)).await;
            let result = runtime
                .run(TransformKind::N, "//OUT %s\n//FAIL", &["changed"], "abc")
                .await;

            assert!(matches!(result, Err(ResolveError::ExecutionFailure(m)) if m.starts_with("Exit status 3")));
            assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn test_local_engine_timeout() {
            let bin = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            let path = install_fake_engine(bin.path());

            let runtime = runtime_in(&path, scratch.path(), Duration::from_millis(300)).await;
            let result = runtime.run_raw("//SLEEP\n//OUT late").await;

            assert!(matches!(result, Err(ResolveError::ExecutionFailure(m)) if m.starts_with("Timed out")));
            assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        }
    }

    mod remote {
        use super::*;
        use mockito::Matcher;

        fn remote_runtime(url: &str, gzip: bool) -> JsRuntime {
            let config = RemoteRuntimeConfig {
                endpoint: url.to_string(),
                api_key: "secret".to_string(),
                gzip,
            };
            let client = Client::builder().gzip(false).build().unwrap();
            JsRuntime::with_executor(Arc::new(RemoteEngine::new(client, &config)))
        }

        #[tokio::test]
        async fn test_remote_probe_and_execute() {
            let mut server = mockito::Server::new_async().await;
            let probe = server
                .mock("POST", "/run")
                .match_header("x-token", token_for("secret").as_str())
                .match_header("content-type", "text/plain")
                .match_body(PROBE_CODE)
                .with_body("?x=test")
                .expect(1)
                .create_async()
                .await;
            let exec = server
                .mock("POST", "/run")
                .match_body(Matcher::Regex("console\\.log".to_string()))
                .with_body("decoded\n")
                .expect(2)
                .create_async()
                .await;

            let runtime = remote_runtime(&format!("{}/run", server.url()), false);
            for _ in 0..2 {
                let out = runtime
                    .run(TransformKind::N, "console.log(%s)", &["\"abc\""], "abc")
                    .await
                    .unwrap();
                assert_eq!(out, "decoded");
            }

            probe.assert_async().await;
            exec.assert_async().await;
        }

        #[tokio::test]
        async fn test_remote_gzip_round_trip() {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(b"zipped").unwrap();
            let compressed = encoder.finish().unwrap();

            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/")
                .match_body(PROBE_CODE)
                .with_body("?x=test")
                .create_async()
                .await;
            server
                .mock("POST", "/")
                .match_header("content-encoding", "gzip")
                .with_header("content-encoding", "gzip")
                .with_body(compressed)
                .create_async()
                .await;

            let runtime = remote_runtime(&format!("{}/", server.url()), true);
            let out = runtime.run_raw("console.log('zipped')").await.unwrap();
            assert_eq!(out, "zipped");
        }

        #[tokio::test]
        async fn test_remote_failed_probe_is_unavailable() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/")
                .with_status(403)
                .expect(1)
                .create_async()
                .await;

            let runtime = remote_runtime(&format!("{}/", server.url()), false);
            for _ in 0..2 {
                let result = runtime.run_raw("1").await;
                assert!(matches!(result, Err(ResolveError::RuntimeUnavailable(_))));
            }
        }
    }
}
