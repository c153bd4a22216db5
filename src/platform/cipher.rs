//! Per-video signature and n-parameter decoding

use crate::error::ResolveError;
use crate::platform::extractor::{extract_identity, has_guard_idiom, TransformIdentity, TransformKind};
use crate::platform::interpreter::{apply, classify, Classification, Instruction};
use crate::platform::runtime::JsRuntime;
use crate::utils::cache::TokenCache;
use crate::Result;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Engine template: function source, then a call printing the result
const CALL_TEMPLATE: &str = "%s\nconsole.log(%s(%s));";

/// A transform located once per script build
#[derive(Debug)]
struct PreparedTransform {
    identity: TransformIdentity,
    /// Native form, when the body is in the simple class
    instructions: Option<Vec<Instruction>>,
}

/// Decoder bound to one player script.
///
/// Built fresh for every resolution call; nothing is shared across videos.
pub struct Cipher {
    script: Arc<str>,
    runtime: Arc<JsRuntime>,
    signature: OnceLock<std::result::Result<Arc<PreparedTransform>, ResolveError>>,
    n: OnceLock<std::result::Result<Arc<PreparedTransform>, ResolveError>>,
    memo: TokenCache,
    has_guard: bool,
}

impl Cipher {
    pub fn new(script: impl Into<Arc<str>>, runtime: Arc<JsRuntime>) -> Self {
        let script = script.into();
        let has_guard = has_guard_idiom(&script);
        Self {
            script,
            runtime,
            signature: OnceLock::new(),
            n: OnceLock::new(),
            memo: TokenCache::new(),
            has_guard,
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Whether the script carries the `typeof` guard idiom
    pub fn has_guard_idiom(&self) -> bool {
        self.has_guard
    }

    fn prepared(&self, kind: TransformKind) -> Result<Arc<PreparedTransform>> {
        let slot = match kind {
            TransformKind::Signature => &self.signature,
            TransformKind::N => &self.n,
        };
        slot.get_or_init(|| self.prepare(kind))
            .as_ref()
            .map(Arc::clone)
            .map_err(ResolveError::from_shared)
    }

    fn prepare(&self, kind: TransformKind) -> std::result::Result<Arc<PreparedTransform>, ResolveError> {
        let identity = extract_identity(kind, &self.script)?;
        let instructions = match classify(&identity.body, &self.script) {
            Classification::Simple(instructions) => {
                debug!(
                    "{} function {} decodes natively ({} steps)",
                    kind,
                    identity.name,
                    instructions.len()
                );
                Some(instructions)
            }
            Classification::NotRepresentable => {
                debug!("{} function {} needs the JS runtime", kind, identity.name);
                None
            }
        };
        Ok(Arc::new(PreparedTransform {
            identity,
            instructions,
        }))
    }

    /// Decode `token`, computing each distinct token at most once
    pub async fn decode(&self, kind: TransformKind, token: &str) -> Result<String> {
        self.memo
            .get_or_try_decode(kind, token, self.decode_uncached(kind, token))
            .await
    }

    async fn decode_uncached(&self, kind: TransformKind, token: &str) -> Result<String> {
        let prepared = self.prepared(kind)?;

        if let Some(instructions) = &prepared.instructions {
            return Ok(apply(instructions, token));
        }

        let quoted = serde_json::to_string(token)?;
        self.runtime
            .run(
                kind,
                CALL_TEMPLATE,
                &[&prepared.identity.code, &prepared.identity.name, &quoted],
                token,
            )
            .await
    }

    /// Store a value decoded elsewhere, e.g. by the batched solver
    pub async fn remember(&self, kind: TransformKind, token: &str, value: String) {
        self.memo.insert(kind, token, value).await;
    }
}
