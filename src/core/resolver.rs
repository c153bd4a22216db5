//! Library facade: one configured resolver, many resolution calls

use crate::core::config::ResolverConfig;
use crate::core::format::{ResolvedLinks, StreamFormat};
use crate::error::ResolveError;
use crate::platform::cipher::Cipher;
use crate::platform::client::{build_client, fetch_text, HttpClientConfig};
use crate::platform::formats::merge;
use crate::platform::innertube::{PlayerResponse, RawFormat, StreamingUrls};
use crate::platform::links::LinkResolver;
use crate::platform::runtime::JsRuntime;
use crate::platform::solver::ChallengeSolver;
use crate::utils::url::is_remote_location;
use crate::Result;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves playable stream URLs from player responses and a player script
pub struct Resolver {
    config: ResolverConfig,
    http: Client,
    runtime: Arc<JsRuntime>,
    solver: Option<ChallengeSolver>,
}

impl Resolver {
    /// Validate `config`, build the HTTP clients and pick the JS execution target
    pub async fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let http = build_client(&HttpClientConfig::for_downloads(&config))?;
        let remote = build_client(&HttpClientConfig::for_remote_runtime(&config))?;
        let runtime = Arc::new(JsRuntime::from_config(&config, remote).await);
        info!("JS runtime: {}", runtime.describe());
        Ok(Self::with_runtime(config, http, runtime))
    }

    /// Assemble a resolver around an existing runtime
    pub fn with_runtime(config: ResolverConfig, http: Client, runtime: Arc<JsRuntime>) -> Self {
        let solver = config
            .solver
            .enabled
            .then(|| ChallengeSolver::new(&config.solver, http.clone(), runtime.clone()));
        Self {
            config,
            http,
            runtime,
            solver,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<JsRuntime> {
        &self.runtime
    }

    /// Player script text from an http(s) URL or a local file
    pub async fn fetch_player_script(&self, location: &str) -> Result<String> {
        let script = if is_remote_location(location) {
            fetch_text(&self.http, location).await?
        } else {
            tokio::fs::read_to_string(location).await?
        };
        debug!("Player script {} ({} bytes)", location, script.len());
        Ok(script)
    }

    /// Resolve the formats of one client response
    pub async fn resolve(
        &self,
        formats: &[RawFormat],
        script: Option<&str>,
        player_url: &str,
    ) -> Vec<StreamFormat> {
        let cipher = script.map(|s| Cipher::new(s, self.runtime.clone()));
        LinkResolver::new(cipher.as_ref(), player_url)
            .with_solver(self.solver.as_ref())
            .resolve(formats)
            .await
    }

    /// Validate and resolve the responses of several client profiles.
    ///
    /// `responses[0]` is the preferred profile. Formats are merged only when
    /// more than one response is given.
    pub async fn resolve_clients(
        &self,
        responses: &[PlayerResponse],
        video_id: &str,
        script: Option<&str>,
        player_url: &str,
    ) -> Result<ResolvedLinks> {
        if responses.is_empty() {
            return Err(ResolveError::ValidationFailure(
                "No player responses to resolve".to_string(),
            ));
        }
        for response in responses {
            response.validate(video_id)?;
        }

        let cipher = script.map(|s| Cipher::new(s, self.runtime.clone()));
        let links = LinkResolver::new(cipher.as_ref(), player_url).with_solver(self.solver.as_ref());
        let links = &links;

        let per_client = join_all(responses.iter().map(|response| {
            let formats = response.all_formats();
            async move { links.resolve(&formats).await }
        }))
        .await;

        let formats = if per_client.len() > 1 {
            merge(per_client)
        } else {
            per_client.into_iter().flatten().collect()
        };

        let urls = responses
            .iter()
            .map(PlayerResponse::streaming_urls)
            .fold(StreamingUrls::default(), |acc, urls| StreamingUrls {
                dash: acc.dash.or(urls.dash),
                hls: acc.hls.or(urls.hls),
                sabr: acc.sabr.or(urls.sabr),
            });

        info!("Resolved {} formats for {}", formats.len(), video_id);
        Ok(ResolvedLinks::new(formats, urls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SIG_SCRIPT: &str = r#"var _yt_player={};(function(g){"use strict";var XyZ="abc;def;ghi".split(";");
var Wm={zO:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c},vY:function(a,b){a.splice(0,b)},z9:function(a){a.reverse()}};
xm=function(a){a=a.split("");Wm.zO(a,47);Wm.vY(a,1);Wm.z9(a,68);return a.join("")};
g.Tx=function(c){c&&(c=xm(decodeURIComponent(c)));return c};
})(_yt_player);"#;

    fn resolver() -> Resolver {
        Resolver::with_runtime(
            ResolverConfig::new().with_solver(false),
            Client::new(),
            Arc::new(JsRuntime::unavailable("none")),
        )
    }

    fn response(video_id: &str, formats: serde_json::Value, hls: Option<&str>) -> PlayerResponse {
        serde_json::from_value(serde_json::json!({
            "playabilityStatus": {"status": "OK"},
            "videoDetails": {"videoId": video_id},
            "streamingData": {"adaptiveFormats": formats, "hlsManifestUrl": hls}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_clients_merges_profiles() {
        let first = response(
            "vid",
            serde_json::json!([
                {"itag": 140, "mimeType": "audio/mp4", "audioQuality": "AUDIO_QUALITY_MEDIUM",
                 "signatureCipher": "s=ABCDEFGHIJ&sp=sig&url=https%3A%2F%2Fexample.com%2Fa"},
                {"itag": 137, "mimeType": "video/mp4", "height": 1080, "url": "https://example.com/137"}
            ]),
            None,
        );
        let second = response(
            "vid",
            serde_json::json!([
                {"itag": 140, "mimeType": "audio/mp4", "audioQuality": "AUDIO_QUALITY_MEDIUM", "url": "https://other/140"},
                {"itag": 136, "mimeType": "video/mp4", "height": 720, "url": "https://example.com/136"}
            ]),
            Some("https://example.com/hls"),
        );

        let links = resolver()
            .resolve_clients(&[first, second], "vid", Some(SIG_SCRIPT), "https://player")
            .await
            .unwrap();

        let itags: Vec<u32> = links.formats.iter().map(|f| f.itag).collect();
        assert_eq!(itags, vec![137, 136, 140]);
        assert_eq!(links.formats[2].url.as_deref(), Some("https://example.com/a&sig=JIAGFEDCB"));
        assert_eq!(links.hls_manifest_url.as_deref(), Some("https://example.com/hls"));
    }

    #[tokio::test]
    async fn test_single_profile_keeps_order() {
        let only = response(
            "vid",
            serde_json::json!([
                {"itag": 251, "mimeType": "audio/webm", "url": "https://example.com/251"},
                {"itag": 18, "mimeType": "video/mp4", "audioQuality": "AUDIO_QUALITY_LOW", "url": "https://example.com/18"}
            ]),
            None,
        );
        let links = resolver()
            .resolve_clients(&[only], "vid", None, "")
            .await
            .unwrap();
        assert_eq!(links.formats.iter().map(|f| f.itag).collect::<Vec<_>>(), vec![251, 18]);
    }

    #[tokio::test]
    async fn test_resolve_clients_rejects_foreign_response() {
        let other = response("other", serde_json::json!([]), None);
        let result = resolver().resolve_clients(&[other], "vid", None, "").await;
        assert!(matches!(result, Err(ResolveError::ValidationFailure(_))));

        let result = resolver().resolve_clients(&[], "vid", None, "").await;
        assert!(matches!(result, Err(ResolveError::ValidationFailure(_))));
    }

    #[tokio::test]
    async fn test_fetch_player_script() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"var local=1;").unwrap();
        let resolver = resolver();
        let script = resolver
            .fetch_player_script(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(script, "var local=1;");

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/s/player/base.js")
            .with_body("var remote=1;")
            .create_async()
            .await;
        let script = resolver
            .fetch_player_script(&format!("{}/s/player/base.js", server.url()))
            .await
            .unwrap();
        assert_eq!(script, "var remote=1;");

        let missing = resolver.fetch_player_script("/definitely/not/here.js").await;
        assert!(matches!(missing, Err(ResolveError::IoError(_))));
    }

    #[cfg(not(feature = "embedded-js"))]
    #[tokio::test]
    async fn test_new_without_engine() {
        let config = ResolverConfig::new().with_js_runtime("/definitely/not/a/deno");
        let resolver = Resolver::new(config).await.unwrap();
        assert!(!resolver.runtime().is_available());
        assert!(resolver.config().solver.enabled);
    }
}
