//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::format::{ResolvedLinks, StreamFormat};
use crate::platform::formats::{
    audio_formats, combined_formats, first_combined_format, other_formats, video_formats,
};
use crate::utils::itag::describe_itag;
use crate::utils::mime::clean_mime_type;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Output formatter for ryt-resolve
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Spinner shown while resolving; `None` in quiet mode
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if self.verbosity == VerbosityLevel::Quiet {
            return None;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "info:".cyan().bold(), message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "done:".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print debug message
    pub fn debug(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Verbose {
            println!("{} {}", "debug:".dimmed(), message);
        }
    }

    /// Print formats grouped as muxed, video-only, audio-only and the rest
    pub fn print_links(&self, links: &ResolvedLinks) {
        let groups = [
            ("Combined", combined_formats(&links.formats)),
            ("Video only", video_formats(&links.formats)),
            ("Audio only", audio_formats(&links.formats)),
            ("Other", other_formats(&links.formats)),
        ];

        for (title, formats) in groups.iter() {
            if formats.is_empty() {
                continue;
            }
            println!("{}", title.bold().underline());
            for format in formats {
                println!("  {}", format_summary(format));
                match &format.url {
                    Some(url) => println!("    {}", url),
                    None => println!("    {}", "(no url)".red()),
                }
                if self.verbosity != VerbosityLevel::Quiet {
                    for warning in &format.warnings {
                        println!("    {} {}", "!".yellow().bold(), warning.yellow());
                    }
                }
            }
            println!();
        }

        if let Some(best) = first_combined_format(&links.formats) {
            println!("{} {}", "Best muxed:".bold(), format_summary(best));
        }

        let manifests = [
            ("DASH", &links.dash_manifest_url),
            ("HLS", &links.hls_manifest_url),
            ("SABR", &links.server_abr_streaming_url),
        ];
        for (name, url) in manifests.iter() {
            if let Some(url) = url {
                println!("{} {}", format!("{}:", name).bold(), url);
            }
        }
    }

    /// Print links as pretty JSON
    pub fn print_json(&self, links: &ResolvedLinks) -> Result<(), serde_json::Error> {
        println!("{}", serde_json::to_string_pretty(links)?);
        Ok(())
    }
}

/// One-line description of a format, without its URL
pub fn format_summary(format: &StreamFormat) -> String {
    let mut parts = vec![
        format!("itag={}", format.itag).yellow().to_string(),
        describe_itag(format.itag).to_string(),
        clean_mime_type(&format.mime_type).to_string(),
    ];
    if let Some(label) = &format.quality_label {
        parts.push(label.clone());
    }
    if let Some(bitrate) = format.bitrate {
        parts.push(format!("{} kbps", bitrate / 1000));
    }
    if let Some(size) = format.content_length {
        parts.push(format_bytes(size));
    }
    if format.is_drc {
        parts.push("DRC".to_string());
    }
    if format.is_super_resolution {
        parts.push("SR".magenta().to_string());
    }
    parts.join(" | ")
}

/// Format bytes as human-readable string
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = (bytes_f64.ln() / THRESHOLD.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f64 / THRESHOLD.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", value, UNITS[exp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_summary() {
        colored::control::set_override(false);
        let format = StreamFormat {
            itag: 18,
            mime_type: "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"".to_string(),
            quality_label: Some("360p".to_string()),
            bitrate: Some(503_000),
            content_length: Some(2048),
            is_super_resolution: true,
            ..Default::default()
        };
        assert_eq!(
            format_summary(&format),
            "itag=18 | mp4, video, 360p, audio | video/mp4 | 360p | 503 kbps | 2.0 KB | SR"
        );
    }

    #[test]
    fn test_quiet_mode_has_no_spinner() {
        let formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        assert!(formatter.spinner("Resolving").is_none());

        // These should not print anything in quiet mode
        formatter.info("test");
        formatter.warning("test");
        formatter.debug("test");
    }

    #[test]
    fn test_print_links() {
        let formatter = OutputFormatter::new(VerbosityLevel::Normal);
        let links = ResolvedLinks {
            formats: vec![
                StreamFormat {
                    itag: 140,
                    mime_type: "audio/mp4".to_string(),
                    warnings: vec!["Unable to decrypt n".to_string()],
                    ..Default::default()
                },
                StreamFormat {
                    itag: 999,
                    warnings: vec!["Format has neither url nor cipher".to_string()],
                    ..Default::default()
                },
            ],
            hls_manifest_url: Some("https://example.com/hls".to_string()),
            ..Default::default()
        };
        formatter.print_links(&links);
        assert!(formatter.print_json(&links).is_ok());
    }
}
