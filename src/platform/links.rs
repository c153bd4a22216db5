//! Per-format link resolution
//!
//! Every descriptor comes out of [`LinkResolver::resolve`], in input order.
//! Decode failures never drop a format: they are recorded as warnings and the
//! best URL that could be rebuilt is kept.

use crate::core::format::StreamFormat;
use crate::platform::cipher::Cipher;
use crate::platform::extractor::TransformKind;
use crate::platform::innertube::RawFormat;
use crate::platform::solver::ChallengeSolver;
use crate::utils::url::{
    append_signature, extract_n_token, is_super_resolution, parse_cipher, replace_n_token,
};
use futures::future::join_all;
use tracing::{debug, warn};

/// Where the URL and signature of one descriptor come from
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Direct(String),
    Ciphered {
        url: Option<String>,
        signature: Option<String>,
        signature_param: String,
    },
    Missing,
}

impl Source {
    fn of(raw: &RawFormat) -> Self {
        if let Some(url) = raw.direct_url() {
            return Source::Direct(url.to_string());
        }
        match raw.cipher_query() {
            Some(query) => {
                let params = parse_cipher(query);
                Source::Ciphered {
                    url: params.url,
                    signature: params.signature,
                    signature_param: params.signature_param,
                }
            }
            None => Source::Missing,
        }
    }

    fn base_url(&self) -> Option<&str> {
        match self {
            Source::Direct(url) => Some(url),
            Source::Ciphered { url, .. } => url.as_deref(),
            Source::Missing => None,
        }
    }

    fn signature(&self) -> Option<&str> {
        match self {
            Source::Ciphered { signature, .. } => signature.as_deref(),
            _ => None,
        }
    }
}

/// Decodes the formats of one player response against one script build
pub struct LinkResolver<'a> {
    cipher: Option<&'a Cipher>,
    solver: Option<&'a ChallengeSolver>,
    player_url: String,
}

impl<'a> LinkResolver<'a> {
    /// `cipher` is `None` when no player script is available
    pub fn new(cipher: Option<&'a Cipher>, player_url: &str) -> Self {
        Self {
            cipher,
            solver: None,
            player_url: player_url.to_string(),
        }
    }

    /// Batch tokens through `solver` when the script allows it
    pub fn with_solver(mut self, solver: Option<&'a ChallengeSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Resolve every descriptor; output order matches input order
    pub async fn resolve(&self, formats: &[RawFormat]) -> Vec<StreamFormat> {
        let sources: Vec<Source> = formats.iter().map(Source::of).collect();

        if let (Some(cipher), Some(solver)) = (self.cipher, self.solver) {
            if cipher.has_guard_idiom() {
                debug!("Guard idiom present, decoding per format");
            } else {
                self.prefetch(cipher, solver, &sources).await;
            }
        }

        join_all(
            formats
                .iter()
                .zip(sources.iter())
                .map(|(raw, source)| self.resolve_one(raw, source)),
        )
        .await
    }

    /// Solve all tokens in one engine call and seed the decoder's memo.
    ///
    /// Tokens the solver did not answer are decoded per format afterwards.
    async fn prefetch(&self, cipher: &Cipher, solver: &ChallengeSolver, sources: &[Source]) {
        let n_params: Vec<String> = sources
            .iter()
            .filter_map(|s| s.base_url().and_then(extract_n_token))
            .map(str::to_string)
            .collect();
        let signatures: Vec<String> = sources
            .iter()
            .filter_map(Source::signature)
            .map(str::to_string)
            .collect();

        if n_params.is_empty() && signatures.is_empty() {
            return;
        }

        let Some(solved) = solver.solve(&n_params, &signatures, cipher.script()).await else {
            debug!("Falling back to per-format decoding");
            return;
        };

        debug!(
            "Solver answered {} n and {} sig challenges",
            solved.n.len(),
            solved.sig.len()
        );
        for (token, value) in solved.n {
            cipher.remember(TransformKind::N, &token, value).await;
        }
        for (token, value) in solved.sig {
            cipher.remember(TransformKind::Signature, &token, value).await;
        }
    }

    async fn resolve_one(&self, raw: &RawFormat, source: &Source) -> StreamFormat {
        let mut format = StreamFormat::from_raw(raw);

        let Some(base) = source.base_url() else {
            let reason = match source {
                Source::Missing => "Format has neither url nor cipher",
                _ => "Cipher carries no url",
            };
            warn!("itag {}: {}", raw.itag, reason);
            format.warnings.push(reason.to_string());
            return format;
        };

        let Some(cipher) = self.cipher else {
            if source.signature().is_some() {
                format
                    .warnings
                    .push(self.warning("s", "no player script available"));
            }
            format.url = Some(base.to_string());
            format.is_super_resolution = is_super_resolution(base);
            return format;
        };

        let mut url = base.to_string();

        if let Some(token) = extract_n_token(base) {
            match cipher.decode(TransformKind::N, token).await {
                Ok(decoded) if decoded != token => url = replace_n_token(&url, token, &decoded),
                Ok(_) => {}
                Err(e) => format.warnings.push(self.warning("n", &e.to_string())),
            }
        }

        if let Source::Ciphered {
            signature: Some(signature),
            signature_param,
            ..
        } = source
        {
            match cipher.decode(TransformKind::Signature, signature).await {
                Ok(decoded) => url = append_signature(&url, signature_param, &decoded),
                Err(e) => format.warnings.push(self.warning("s", &e.to_string())),
            }
        }

        for warning in &format.warnings {
            warn!("itag {}: {}", raw.itag, warning);
        }

        format.is_super_resolution = is_super_resolution(&url);
        format.url = Some(url);
        format
    }

    fn warning(&self, what: &str, reason: &str) -> String {
        format!(
            "Unable to decrypt {}: {}. This URL may yield HTTP 403 Forbidden error. (player: {})",
            what, reason, self.player_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SolverConfig;
    use crate::platform::runtime::tests::MockExecutor;
    use crate::platform::runtime::JsRuntime;
    use sha3::{Digest, Sha3_512};
    use std::sync::Arc;

    const PLAYER_URL: &str = "https://www.youtube.com/s/player/abc123/base.js";

    const SIG_SCRIPT: &str = r#"var _yt_player={};(function(g){"use strict";var XyZ="abc;def;ghi".split(";");
var Wm={zO:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c},vY:function(a,b){a.splice(0,b)},z9:function(a){a.reverse()}};
xm=function(a){a=a.split("");Wm.zO(a,47);Wm.vY(a,1);Wm.z9(a,68);return a.join("")};
g.Tx=function(c){c&&(c=xm(decodeURIComponent(c)));return c};
})(_yt_player);"#;

    const N_SCRIPT: &str = r#"(function(g){"use strict";var XyZ="a-b-c".split("-");
var Iw=[zo,yo];var Kx;
g.D&&(b=a.get("n"))&&(b=Iw[0](b),a.set("n",b));
zo=function(a){var b=a.split(""),c=[XyZ[0]];if(typeof Kx==="undefined")return a;try{b.reverse()}catch(d){return"enhanced_except_w8_"+a}return b.join("")};
yo=function(a){return a};
})(_yt_player);"#;

    fn raw(json: serde_json::Value) -> RawFormat {
        serde_json::from_value(json).unwrap()
    }

    fn unavailable() -> Arc<JsRuntime> {
        Arc::new(JsRuntime::unavailable("none"))
    }

    #[tokio::test]
    async fn test_plain_and_failing_cipher_both_returned() {
        let formats = vec![
            raw(serde_json::json!({"itag": 18, "mimeType": "video/mp4", "url": "https://example.com/vp?itag=18"})),
            raw(serde_json::json!({
                "itag": 251,
                "mimeType": "audio/webm",
                "signatureCipher": "s=ABC&sp=sig&url=https%3A%2F%2Fexample.com%2Fvp%3Fitag%3D251"
            })),
        ];
        let cipher = Cipher::new("var a=1;", unavailable());
        let resolved = LinkResolver::new(Some(&cipher), PLAYER_URL).resolve(&formats).await;

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].url.as_deref(), Some("https://example.com/vp?itag=18"));
        assert!(resolved[0].warnings.is_empty());

        assert_eq!(resolved[1].itag, 251);
        assert_eq!(resolved[1].url.as_deref(), Some("https://example.com/vp?itag=251"));
        assert_eq!(resolved[1].warnings.len(), 1);
        assert!(resolved[1].warnings[0].starts_with("Unable to decrypt s: Extraction failed"));
        assert!(resolved[1].warnings[0].ends_with(&format!("(player: {})", PLAYER_URL)));
    }

    #[tokio::test]
    async fn test_native_signature_is_appended() {
        let formats = vec![raw(serde_json::json!({
            "itag": 251,
            "signatureCipher": "s=ABCDEFGHIJ&url=https%3A%2F%2Fexample.com%2Fvp%3Fitag%3D251"
        }))];
        let cipher = Cipher::new(SIG_SCRIPT, unavailable());
        let resolved = LinkResolver::new(Some(&cipher), PLAYER_URL).resolve(&formats).await;

        assert_eq!(
            resolved[0].url.as_deref(),
            Some("https://example.com/vp?itag=251&signature=JIAGFEDCB")
        );
        assert!(resolved[0].warnings.is_empty());
    }

    #[tokio::test]
    async fn test_n_decoded_once_and_order_kept() {
        let executor = Arc::new(MockExecutor::new(vec![Ok("cba".to_string())]));
        let cipher = Cipher::new(N_SCRIPT, Arc::new(JsRuntime::with_executor(executor.clone())));
        let formats: Vec<RawFormat> = [137, 22, 140]
            .iter()
            .map(|itag| {
                raw(serde_json::json!({
                    "itag": itag,
                    "url": format!("https://example.com/vp?itag={}&n=abc&xtags=sr%3D1&end=1", itag)
                }))
            })
            .collect();

        let resolved = LinkResolver::new(Some(&cipher), PLAYER_URL).resolve(&formats).await;

        assert_eq!(resolved.iter().map(|f| f.itag).collect::<Vec<_>>(), vec![137, 22, 140]);
        assert_eq!(
            resolved[1].url.as_deref(),
            Some("https://example.com/vp?itag=22&n=cba&xtags=sr%3D1&end=1")
        );
        assert!(resolved.iter().all(|f| f.is_super_resolution));
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn test_n_failure_keeps_url() {
        let cipher = Cipher::new(N_SCRIPT, unavailable());
        let formats = vec![raw(serde_json::json!({"itag": 18, "url": "https://example.com/vp?x=0&n=abc&x=1"}))];
        let resolved = LinkResolver::new(Some(&cipher), PLAYER_URL).resolve(&formats).await;

        assert_eq!(resolved[0].url.as_deref(), Some("https://example.com/vp?x=0&n=abc&x=1"));
        assert!(resolved[0].warnings[0].starts_with("Unable to decrypt n: JS runtime unavailable: none."));
        assert!(!resolved[0].is_super_resolution);
    }

    #[tokio::test]
    async fn test_without_script() {
        let formats = vec![
            raw(serde_json::json!({"itag": 18, "url": "https://example.com/a?n=abc&x=1"})),
            raw(serde_json::json!({"itag": 140, "cipher": "s=S&url=https%3A%2F%2Fexample.com%2Fb"})),
            raw(serde_json::json!({"itag": 141})),
        ];
        let resolved = LinkResolver::new(None, "").resolve(&formats).await;

        assert_eq!(resolved[0].url.as_deref(), Some("https://example.com/a?n=abc&x=1"));
        assert!(resolved[0].warnings.is_empty());
        assert_eq!(resolved[1].url.as_deref(), Some("https://example.com/b"));
        assert!(resolved[1].warnings[0].contains("no player script available"));
        assert_eq!(resolved[2].url, None);
        assert_eq!(resolved[2].warnings, vec!["Format has neither url nor cipher"]);
    }

    #[tokio::test]
    async fn test_batched_with_per_format_fallback() {
        const LIB_BODY: &str = r#"{"data":{"code":"var lib={};"}}"#;
        const CORE_BODY: &str = "var jsc=function(r){return r};";
        let digest = |content: &str| hex::encode(Sha3_512::digest(content.as_bytes()));

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/_hashes.json")
            .with_body(
                serde_json::json!({"lib.json": digest(LIB_BODY), "yt.solver.core.js": digest(CORE_BODY)})
                    .to_string(),
            )
            .create_async()
            .await;
        let cache = tempfile::tempdir().unwrap();
        std::fs::write(cache.path().join("yt.lib.json"), LIB_BODY).unwrap();
        std::fs::write(cache.path().join("yt.solver.core.js"), CORE_BODY).unwrap();

        let executor = Arc::new(MockExecutor::new(vec![Ok(
            r#"{"type":"result","responses":[{"type":"result","data":{"n1":"N1"}},{"type":"result","data":{"s1":"S1"}}]}"#
                .to_string(),
        )]));
        let runtime = Arc::new(JsRuntime::with_executor(executor.clone()));
        let config = SolverConfig {
            enabled: true,
            lib_url: format!("{}/lib.json", server.url()),
            core_url: format!("{}/core.js", server.url()),
            manifest_url: format!("{}/_hashes.json", server.url()),
            cache_dir: Some(cache.path().to_path_buf()),
        };
        let solver = ChallengeSolver::new(&config, reqwest::Client::new(), runtime.clone());
        let cipher = Cipher::new("var nothing=1;", runtime);

        let formats = vec![
            raw(serde_json::json!({
                "itag": 18,
                "signatureCipher": "s=s1&sp=sig&url=https%3A%2F%2Fexample.com%2Fvp%3Fitag%3D18%26n%3Dn1%26x%3D1"
            })),
            raw(serde_json::json!({"itag": 22, "url": "https://example.com/vp?itag=22&n=n2&x=1"})),
        ];
        let resolved = LinkResolver::new(Some(&cipher), PLAYER_URL)
            .with_solver(Some(&solver))
            .resolve(&formats)
            .await;

        assert_eq!(
            resolved[0].url.as_deref(),
            Some("https://example.com/vp?itag=18&n=N1&x=1&sig=S1")
        );
        assert!(resolved[0].warnings.is_empty());

        assert_eq!(resolved[1].url.as_deref(), Some("https://example.com/vp?itag=22&n=n2&x=1"));
        assert!(resolved[1].warnings[0].starts_with("Unable to decrypt n: Extraction failed"));
        assert_eq!(executor.calls(), 1);
    }
}
