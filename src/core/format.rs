//! Resolved stream format structures

use crate::platform::innertube::{RawFormat, StreamingUrls};
use crate::utils::mime::{is_audio_mime, is_video_mime};
use serde::{Deserialize, Serialize};

/// A media descriptor after link resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFormat {
    /// Provider format ID
    pub itag: u32,
    /// MIME type including codec parameters
    pub mime_type: String,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Size in bytes (if known)
    pub content_length: Option<u64>,
    pub quality: Option<String>,
    /// Quality label (e.g., "720p", "1080p")
    pub quality_label: Option<String>,
    /// `AUDIO_QUALITY_*`; present on muxed and audio streams
    pub audio_quality: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub fps: Option<u32>,
    /// Dynamic range compressed audio
    pub is_drc: bool,
    /// Playable URL; `None` only when nothing was recoverable
    pub url: Option<String>,
    /// AI-upscaled stream
    pub is_super_resolution: bool,
    /// Non-fatal decode problems
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StreamFormat {
    /// Copy the descriptive fields of a raw descriptor; URL is filled later
    pub fn from_raw(raw: &RawFormat) -> Self {
        Self {
            itag: raw.itag,
            mime_type: raw.mime_type.clone().unwrap_or_default(),
            bitrate: raw.bitrate,
            width: raw.width,
            height: raw.height,
            content_length: raw.content_length(),
            quality: raw.quality.clone(),
            quality_label: raw.quality_label.clone(),
            audio_quality: raw.audio_quality.clone(),
            audio_sample_rate: raw.audio_sample_rate(),
            fps: raw.fps,
            is_drc: raw.is_drc,
            url: None,
            is_super_resolution: false,
            warnings: Vec::new(),
        }
    }

    /// Video track with audio muxed in
    pub fn is_combined(&self) -> bool {
        is_video_mime(&self.mime_type) && self.has_audio_quality()
    }

    pub fn is_video_only(&self) -> bool {
        is_video_mime(&self.mime_type) && !self.has_audio_quality()
    }

    pub fn is_audio_only(&self) -> bool {
        is_audio_mime(&self.mime_type)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn has_audio_quality(&self) -> bool {
        self.audio_quality.as_deref().is_some_and(|q| !q.is_empty())
    }
}

/// Everything a resolution call produces for one video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLinks {
    pub formats: Vec<StreamFormat>,
    pub dash_manifest_url: Option<String>,
    pub hls_manifest_url: Option<String>,
    pub server_abr_streaming_url: Option<String>,
}

impl ResolvedLinks {
    pub fn new(formats: Vec<StreamFormat>, urls: StreamingUrls) -> Self {
        Self {
            formats,
            dash_manifest_url: urls.dash,
            hls_manifest_url: urls.hls,
            server_abr_streaming_url: urls.sabr,
        }
    }

    /// Number of formats that carry decode warnings
    pub fn warned_count(&self) -> usize {
        self.formats.iter().filter(|f| f.has_warnings()).count()
    }
}
