//! MIME type helpers for provider `mimeType` strings
//!
//! The provider sends values like `video/mp4; codecs="avc1.4d401f, mp4a.40.2"`.

/// MIME type without parameters
pub fn clean_mime_type(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or_default().trim()
}

pub fn is_video_mime(mime_type: &str) -> bool {
    mime_type.trim_start().starts_with("video/")
}

pub fn is_audio_mime(mime_type: &str) -> bool {
    mime_type.trim_start().starts_with("audio/")
}
