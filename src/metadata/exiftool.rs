//! External metadata tool invocation
//!
//! Shells out to `exiftool` (JSON mode, first record) with an `ffprobe`
//! fallback when exiftool is missing or yields nothing. Both tools are
//! located on PATH. Every failure here is recoverable; the extractor treats
//! it as "no metadata".

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::metadata::Metadata;

// =============================================================================
// exiftool
// =============================================================================

/// First record of `exiftool -j -n` output; numeric because of `-n`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExifToolRecord {
    #[serde(rename = "MIMEType")]
    mime_type: String,
    #[serde(rename = "Duration")]
    duration: Option<Value>,
    #[serde(rename = "ImageWidth")]
    image_width: Option<u32>,
    #[serde(rename = "ImageHeight")]
    image_height: Option<u32>,
    #[serde(rename = "VideoFrameRate")]
    video_frame_rate: Option<f64>,
    // Sometimes a number, sometimes a string like "25"
    #[serde(rename = "FrameRate")]
    frame_rate: Option<Value>,
    #[serde(rename = "CompressorID")]
    compressor_id: String,
    #[serde(rename = "CompressorName")]
    compressor_name: String,
    #[serde(rename = "ClipName")]
    clip_name: String,
    #[serde(rename = "CameraID")]
    camera_id: String,
    #[serde(rename = "ReelNumber")]
    reel_number: String,
    #[serde(rename = "TimeCode")]
    time_code: String,
    #[serde(rename = "StartTimecode")]
    start_timecode: String,
}

/// Run exiftool on a file and map its first JSON record
pub fn extract_exiftool(path: &Path) -> Result<Metadata> {
    let output = Command::new("exiftool")
        .args(["-j", "-n", "-API", "LargeFileSupport=1"])
        .arg(path)
        .output()
        .map_err(|e| Error::Metadata(format!("failed to run exiftool: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Metadata(format!(
            "exiftool exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // exiftool emits an array, one record per input file
    let records: Vec<ExifToolRecord> = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::Metadata(format!("exiftool parse error: {}", e)))?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| Error::Metadata("exiftool produced no records".into()))?;

    trace!(path = %path.display(), "exiftool record mapped");
    Ok(map_exiftool(path, record))
}

fn map_exiftool(path: &Path, record: ExifToolRecord) -> Metadata {
    let mut meta = Metadata::default();

    // Codec, most specific source first
    if record.mime_type.to_lowercase().contains("red") {
        meta.codec = "REDCODE RAW".to_string();
    } else if !record.compressor_name.is_empty() {
        meta.codec = record.compressor_name;
    } else if !record.compressor_id.is_empty() {
        meta.codec = record.compressor_id;
    } else if let Some(ext) = path.extension() {
        meta.codec = ext.to_string_lossy().to_string();
    }
    meta.format = record.mime_type;

    if let (Some(width), Some(height)) = (record.image_width, record.image_height) {
        if width > 0 && height > 0 {
            meta.resolution = format!("{}x{}", width, height);
        }
    }

    if let Some(rate) = record.video_frame_rate.filter(|r| *r > 0.0) {
        meta.frame_rate = format!("{:.3}", rate);
    } else if let Some(rate) = record.frame_rate.as_ref().and_then(value_as_f64) {
        if rate > 0.0 {
            meta.frame_rate = format!("{:.3}", rate);
        }
    }

    if let Some(duration) = record.duration.as_ref().and_then(value_as_f64) {
        meta.duration = format!("{}s", duration);
    }

    if !record.time_code.is_empty() {
        meta.timecode = record.time_code;
    } else if !record.start_timecode.is_empty() {
        meta.timecode = record.start_timecode;
    }

    meta.camera_id = record.camera_id;
    meta.reel_number = record.reel_number;
    meta.clip_name = record.clip_name;

    meta
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// =============================================================================
// ffprobe fallback
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeStream {
    codec_name: String,
    codec_type: String,
    width: u32,
    height: u32,
    r_frame_rate: String,
    bit_rate: String,
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeFormat {
    format_name: String,
    duration: String,
    bit_rate: String,
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeTags {
    timecode: String,
}

/// Run ffprobe on a file and map its format/stream JSON
pub fn extract_ffprobe(path: &Path) -> Result<Metadata> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| Error::Metadata(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Metadata(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let data: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::Metadata(format!("ffprobe parse error: {}", e)))?;

    let mut meta = Metadata {
        format: data.format.format_name.clone(),
        ..Metadata::default()
    };
    if !data.format.duration.is_empty() {
        meta.duration = format!("{}s", data.format.duration);
    }
    if !data.format.bit_rate.is_empty() {
        meta.bitrate = data.format.bit_rate.clone();
    }

    if let Some(video) = data.streams.iter().find(|s| s.codec_type == "video") {
        meta.codec = video.codec_name.clone();
        if video.width > 0 && video.height > 0 {
            meta.resolution = format!("{}x{}", video.width, video.height);
        }
        meta.frame_rate = video.r_frame_rate.clone();
        if !video.bit_rate.is_empty() {
            meta.bitrate = video.bit_rate.clone();
        }
        if !video.tags.timecode.is_empty() {
            meta.timecode = video.tags.timecode.clone();
        }
    }
    if meta.timecode.is_empty() && !data.format.tags.timecode.is_empty() {
        meta.timecode = data.format.tags.timecode.clone();
    }

    debug!(path = %path.display(), format = %meta.format, "ffprobe fallback used");
    Ok(meta)
}
