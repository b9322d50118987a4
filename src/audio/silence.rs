use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SplitError};

use super::{AudioAnalyzer, MarkerKind, SilenceMarker};

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"silence_(start|end):\s*([^\s|]+)").expect("Invalid regex")
    })
}

/// Parse silencedetect diagnostics into markers, in the order they appear.
///
/// Any line that mentions a marker label but lacks a readable time is an error.
pub fn parse_silence_markers(report: &str) -> Result<Vec<SilenceMarker>> {
    let mut markers = Vec::new();

    for (line_no, line) in report.lines().enumerate() {
        if !line.contains("silence_start") && !line.contains("silence_end") {
            continue;
        }

        let caps = marker_regex().captures(line).ok_or_else(|| {
            SplitError::Parse(format!(
                "line {}: silence marker without a time value: {}",
                line_no + 1,
                line.trim()
            ))
        })?;

        let kind = match &caps[1] {
            "start" => MarkerKind::Start,
            _ => MarkerKind::End,
        };
        let time: f64 = caps[2].parse().map_err(|e| {
            SplitError::Parse(format!(
                "line {}: bad silence time '{}': {e}",
                line_no + 1,
                &caps[2]
            ))
        })?;

        markers.push(SilenceMarker { kind, time });
    }

    Ok(markers)
}

/// Flatten markers to the untyped time sequence the planner consumes.
///
/// Start and end markers are merged in report order; the kind is not consulted.
pub fn marker_times(markers: &[SilenceMarker]) -> Vec<f64> {
    markers.iter().map(|m| m.time).collect()
}

/// Run silence analysis over `audio` and return candidate cut points in seconds.
pub async fn detect_silence(
    analyzer: &dyn AudioAnalyzer,
    audio: &Path,
    threshold_db: f64,
    min_silence: Duration,
) -> Result<Vec<f64>> {
    let report = analyzer
        .silence_report(audio, threshold_db, min_silence)
        .await?;
    let markers = parse_silence_markers(&report)?;

    let starts = markers
        .iter()
        .filter(|m| m.kind == MarkerKind::Start)
        .count();
    debug!(
        "Parsed {} silence starts and {} silence ends",
        starts,
        markers.len() - starts
    );
    info!(
        "Detected {} silence markers at {} dB",
        markers.len(),
        threshold_db
    );

    Ok(marker_times(&markers))
}
