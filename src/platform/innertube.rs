//! Player API response model
//!
//! Only the fields link resolution reads are modelled; everything else in the
//! provider JSON is ignored.

use crate::error::ResolveError;
use serde::Deserialize;
use tracing::debug;

/// Response of the `/youtubei/v1/player` endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerResponse {
    #[serde(rename = "playabilityStatus")]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(rename = "videoDetails")]
    pub video_details: Option<VideoDetails>,
    #[serde(rename = "streamingData")]
    pub streaming_data: Option<StreamingData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoDetails {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamingData {
    /// Muxed audio+video streams
    #[serde(default)]
    pub formats: Vec<RawFormat>,
    /// Video-only or audio-only streams
    #[serde(rename = "adaptiveFormats", default)]
    pub adaptive_formats: Vec<RawFormat>,
    #[serde(rename = "dashManifestUrl")]
    pub dash_manifest_url: Option<String>,
    #[serde(rename = "hlsManifestUrl")]
    pub hls_manifest_url: Option<String>,
    #[serde(rename = "serverAbrStreamingUrl")]
    pub server_abr_streaming_url: Option<String>,
}

/// One media descriptor exactly as the provider sends it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub itag: u32,
    pub url: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(rename = "contentLength")]
    pub content_length: Option<String>,
    pub quality: Option<String>,
    #[serde(rename = "qualityLabel")]
    pub quality_label: Option<String>,
    #[serde(rename = "audioQuality")]
    pub audio_quality: Option<String>,
    #[serde(rename = "audioSampleRate")]
    pub audio_sample_rate: Option<serde_json::Value>,
    pub fps: Option<u32>,
    #[serde(rename = "isDrc", default)]
    pub is_drc: bool,
    pub cipher: Option<String>,
    #[serde(rename = "signatureCipher")]
    pub signature_cipher: Option<String>,
}

impl RawFormat {
    /// Cipher query string, under whichever key the provider used
    pub fn cipher_query(&self) -> Option<&str> {
        self.cipher
            .as_deref()
            .or(self.signature_cipher.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Direct URL, when the descriptor carries one
    pub fn direct_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// Sample rate as a number; the provider sends it as a string
    pub fn audio_sample_rate(&self) -> Option<u32> {
        self.audio_sample_rate.as_ref().and_then(|v| {
            v.as_str()
                .and_then(|s| s.parse().ok())
                .or_else(|| v.as_u64().map(|n| n as u32))
        })
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Manifest URLs advertised next to the formats
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingUrls {
    pub dash: Option<String>,
    pub hls: Option<String>,
    pub sabr: Option<String>,
}

impl PlayerResponse {
    /// Parse a saved response body
    pub fn from_json(body: &str) -> Result<Self, ResolveError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Combined formats followed by adaptive formats
    pub fn all_formats(&self) -> Vec<RawFormat> {
        match &self.streaming_data {
            Some(data) => data
                .formats
                .iter()
                .chain(data.adaptive_formats.iter())
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn streaming_urls(&self) -> StreamingUrls {
        match &self.streaming_data {
            Some(data) => StreamingUrls {
                dash: data.dash_manifest_url.clone(),
                hls: data.hls_manifest_url.clone(),
                sabr: data.server_abr_streaming_url.clone(),
            },
            None => StreamingUrls::default(),
        }
    }

    /// Video the response was produced for
    pub fn video_id(&self) -> Option<&str> {
        self.video_details.as_ref().map(|d| d.video_id.as_str())
    }

    /// Human-readable reason when the video is not playable
    pub fn playability_reason(&self) -> Option<String> {
        let status = self.playability_status.as_ref()?;
        status
            .reason
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| Some(status.messages.join(" ")).filter(|m| !m.is_empty()))
    }

    /// Reject responses for another video and unplayable responses
    pub fn validate(&self, video_id: &str) -> Result<(), ResolveError> {
        let actual = self.video_id().unwrap_or_default();
        if actual != video_id {
            return Err(ResolveError::ValidationFailure(format!(
                "Invalid player response: got player response for video \"{}\" instead of \"{}\"",
                actual, video_id
            )));
        }

        if let Some(status) = &self.playability_status {
            if !status.status.is_empty() && status.status != "OK" {
                let reason = self
                    .playability_reason()
                    .unwrap_or_else(|| format!("Video is not playable ({})", status.status));
                debug!("Playability status {} for {}", status.status, video_id);
                return Err(ResolveError::ValidationFailure(reason));
            }
        }

        Ok(())
    }
}
