//! Cross-client format aggregation, ranking and deduplication

use crate::core::format::StreamFormat;
use std::cmp::Reverse;
use tracing::debug;

/// Ranking class: muxed streams first, then video-only, then audio-only
fn class(format: &StreamFormat) -> u8 {
    if format.is_combined() {
        0
    } else if format.is_video_only() {
        1
    } else {
        2
    }
}

/// Audio tier; unknown sorts before ultralow
fn audio_tier(quality: Option<&str>) -> u32 {
    match quality.unwrap_or_default() {
        "AUDIO_QUALITY_ULTRALOW" => 1,
        "AUDIO_QUALITY_LOW" => 2,
        "AUDIO_QUALITY_MEDIUM" => 3,
        "AUDIO_QUALITY_HIGH" => 4,
        _ => 0,
    }
}

type SortKey = (u8, u32, Reverse<u32>, u32, bool, Reverse<i64>);

fn sort_key(format: &StreamFormat, preference: i64) -> SortKey {
    let class = class(format);
    let rank = match class {
        0 => format.itag,
        1 => 0,
        _ => audio_tier(format.audio_quality.as_deref()),
    };
    (
        class,
        rank,
        Reverse(format.height.unwrap_or(0)),
        format.itag,
        format.is_drc,
        Reverse(preference),
    )
}

/// Merge the resolved formats of several client profiles.
///
/// `per_client[i]` gets preference `-i`, so earlier profiles win ties.
/// After a stable sort, entries repeating the previous kept `(itag, is_drc)`
/// are dropped.
pub fn merge(per_client: Vec<Vec<StreamFormat>>) -> Vec<StreamFormat> {
    let mut tagged: Vec<(i64, StreamFormat)> = per_client
        .into_iter()
        .enumerate()
        .flat_map(|(idx, formats)| {
            let preference = -(idx as i64);
            formats.into_iter().map(move |format| (preference, format))
        })
        .collect();
    let total = tagged.len();

    tagged.sort_by_key(|(preference, format)| sort_key(format, *preference));

    let mut merged: Vec<StreamFormat> = Vec::with_capacity(total);
    for (_, format) in tagged {
        let duplicate = merged
            .last()
            .is_some_and(|last| last.itag == format.itag && last.is_drc == format.is_drc);
        if !duplicate {
            merged.push(format);
        }
    }

    debug!("Merged {} formats into {}", total, merged.len());
    merged
}

/// Muxed audio+video formats
pub fn combined_formats(formats: &[StreamFormat]) -> Vec<&StreamFormat> {
    formats.iter().filter(|f| f.is_combined()).collect()
}

pub fn video_formats(formats: &[StreamFormat]) -> Vec<&StreamFormat> {
    formats.iter().filter(|f| f.is_video_only()).collect()
}

pub fn audio_formats(formats: &[StreamFormat]) -> Vec<&StreamFormat> {
    formats.iter().filter(|f| f.is_audio_only()).collect()
}

/// Formats outside the three classes, e.g. with an empty or unknown MIME type
pub fn other_formats(formats: &[StreamFormat]) -> Vec<&StreamFormat> {
    formats
        .iter()
        .filter(|f| !f.is_combined() && !f.is_video_only() && !f.is_audio_only())
        .collect()
}

/// First muxed format that carries a URL
pub fn first_combined_format(formats: &[StreamFormat]) -> Option<&StreamFormat> {
    formats.iter().find(|f| f.is_combined() && f.url.is_some())
}
