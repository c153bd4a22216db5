//! URL utilities for stream URLs and cipher query strings

use crate::error::ResolveError;
use std::collections::HashMap;
use url::Url;

/// Parameter name used when a cipher omits `sp`
pub const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// Fields carried by a `cipher`/`signatureCipher` query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherParams {
    /// Base stream URL (may still contain an undecoded n-token)
    pub url: Option<String>,
    /// Obfuscated signature token
    pub signature: Option<String>,
    /// Query parameter name the decoded signature is reattached under
    pub signature_param: String,
}

/// Parse a cipher query string into its url/s/sp parts
pub fn parse_cipher(cipher: &str) -> CipherParams {
    let params: HashMap<String, String> = url::form_urlencoded::parse(cipher.as_bytes())
        .into_owned()
        .collect();

    CipherParams {
        url: params.get("url").filter(|u| !u.is_empty()).cloned(),
        signature: params.get("s").filter(|s| !s.is_empty()).cloned(),
        signature_param: params
            .get("sp")
            .filter(|sp| !sp.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_SIGNATURE_PARAM.to_string()),
    }
}

/// Read the n-token from the literal `&n=<token>&` fragment.
///
/// The token is taken verbatim; a trailing `n=` without a following `&`
/// is not considered.
pub fn extract_n_token(url: &str) -> Option<&str> {
    let start = url.find("&n=")? + 3;
    let rest = &url[start..];
    let end = rest.find('&')?;
    Some(&rest[..end])
}

/// Replace `&n=<old>&` with `&n=<new>&`
pub fn replace_n_token(url: &str, old: &str, new: &str) -> String {
    url.replace(&format!("&n={}&", old), &format!("&n={}&", new))
}

/// Append `&<param>=<value>` with the value form-urlencoded
pub fn append_signature(url: &str, param: &str, value: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{}&{}={}", url, param, encoded)
}

/// Check whether the URL marks a server-side upscaled ("super resolution") stream
pub fn is_super_resolution(url: &str) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';

    url.match_indices("sr%3D1").any(|(idx, m)| {
        let before = url[..idx].chars().next_back();
        let after = url[idx + m.len()..].chars().next();
        matches!((before, after), (Some(b), Some(a)) if !is_word(b) && !is_word(a))
    })
}

/// Check if a configured runtime location points at a remote worker
pub fn is_remote_location(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Extract video ID from a raw ID or a supported watch URL
pub fn extract_video_id(input: &str) -> Result<String, ResolveError> {
    let is_raw_id = input.len() == 11
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if is_raw_id {
        return Ok(input.to_string());
    }

    let parsed = Url::parse(input)?;

    match parsed.host_str() {
        Some("youtu.be") => {
            let path = parsed.path().trim_start_matches('/');
            if path.is_empty() {
                return Err(ResolveError::ValidationFailure(
                    "Missing video ID".to_string(),
                ));
            }
            Ok(path.to_string())
        }
        Some("youtube.com") | Some("www.youtube.com") | Some("m.youtube.com") => {
            if parsed.path().starts_with("/watch") {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string())
                    .ok_or_else(|| {
                        ResolveError::ValidationFailure("Missing v parameter".to_string())
                    })
            } else if let Some(video_id) = parsed
                .path()
                .strip_prefix("/shorts/")
                .or_else(|| parsed.path().strip_prefix("/embed/"))
            {
                if video_id.is_empty() {
                    return Err(ResolveError::ValidationFailure(
                        "Missing video ID in path".to_string(),
                    ));
                }
                Ok(video_id.to_string())
            } else {
                Err(ResolveError::ValidationFailure(
                    "Unsupported video URL format".to_string(),
                ))
            }
        }
        _ => Err(ResolveError::ValidationFailure(
            "Not a supported video platform URL".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cipher() {
        let cipher = "s=AOq0QJ8wRAIg%3D%3D&sp=sig&url=https%3A%2F%2Frr1.example.com%2Fvideoplayback%3Fitag%3D18%26n%3DabcDEF%26ip%3D1";
        let params = parse_cipher(cipher);

        assert_eq!(params.signature.as_deref(), Some("AOq0QJ8wRAIg=="));
        assert_eq!(params.signature_param, "sig");
        assert_eq!(
            params.url.as_deref(),
            Some("https://rr1.example.com/videoplayback?itag=18&n=abcDEF&ip=1")
        );
    }

    #[test]
    fn test_parse_cipher_defaults() {
        let params = parse_cipher("s=abc");
        assert_eq!(params.url, None);
        assert_eq!(params.signature_param, DEFAULT_SIGNATURE_PARAM);

        let empty = parse_cipher("");
        assert_eq!(empty.signature, None);
    }

    #[test]
    fn test_extract_n_token() {
        assert_eq!(
            extract_n_token("https://h/videoplayback?itag=18&n=Ab-_c%3D&ip=1"),
            Some("Ab-_c%3D")
        );
        assert_eq!(extract_n_token("https://h/videoplayback?itag=18&n=last"), None);
        assert_eq!(extract_n_token("https://h/videoplayback?n=first&itag=18"), None);
        assert_eq!(extract_n_token("https://h/videoplayback?itag=18&n=&ip=1"), Some(""));
    }

    #[test]
    fn test_replace_n_token() {
        let url = "https://h/v?itag=18&n=old&ip=1";
        assert_eq!(replace_n_token(url, "old", "new"), "https://h/v?itag=18&n=new&ip=1");
        assert_eq!(replace_n_token(url, "missing", "new"), url);
    }

    #[test]
    fn test_append_signature_encodes_value() {
        let url = append_signature("https://h/v?itag=18", "sig", "a/b+c=d e");
        assert_eq!(url, "https://h/v?itag=18&sig=a%2Fb%2Bc%3Dd+e");
    }

    #[test]
    fn test_is_super_resolution() {
        assert!(is_super_resolution("https://h/v?itag=18&xtags=sr%3D1&ip=1"));
        assert!(is_super_resolution("https://h/v?ip=1&sr%3D1&n=x"));
        assert!(!is_super_resolution("https://h/v?xtags=drc%3D1%3Asr%3D1&ip=1"));
        assert!(!is_super_resolution("https://h/v?xtags=sr%3D10&ip=1"));
        assert!(!is_super_resolution("https://h/v?xtags=sr%3D1"));
        assert!(!is_super_resolution("https://h/v?itag=18"));
    }

    #[test]
    fn test_is_remote_location() {
        assert!(is_remote_location("https://worker.example.com/run"));
        assert!(is_remote_location("http://127.0.0.1:8080"));
        assert!(!is_remote_location("/usr/local/bin/deno"));
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(extract_video_id("https://www.youtube.com/feed").is_err());
    }
}
