use log::{error, info};
use serde_json::Value;
use tokio::process::Command;

// Uploads are staged in memory; ffprobe needs a path, so the bytes go to a
// temp file for the duration of the probe.
pub async fn probe_duration(bytes: &[u8]) -> Option<i32> {
    let temp_path = format!("/tmp/{}", uuid::Uuid::new_v4());
    if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
        error!("Failed to stage video for ffprobe: {:?}", e);
        return None;
    }

    let duration = extract_video_duration(&temp_path).await;

    if let Err(e) = tokio::fs::remove_file(&temp_path).await {
        error!("Failed to remove temp file {}: {:?}", temp_path, e);
    }

    match duration {
        Ok(seconds) => Some(seconds),
        Err(e) => {
            error!("Duration extraction failed: {:?}", e);
            None
        }
    }
}

pub async fn extract_video_duration(
    file_path: &str,
) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            file_path,
        ])
        .output()
        .await?;

    if !output.status.success() {
        let error_msg = String::from_utf8_lossy(&output.stderr);
        return Err(format!("ffprobe failed: {}", error_msg).into());
    }

    let parsed: Value = serde_json::from_str(&String::from_utf8(output.stdout)?)?;

    if let Some(duration_str) = parsed
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
    {
        if let Ok(duration) = duration_str.parse::<f64>() {
            info!("Extracted duration from format: {} seconds", duration);
            return Ok(duration.round() as i32);
        }
    }

    // Fallback: the first video stream that reports a duration.
    if let Some(streams) = parsed.get("streams").and_then(|s| s.as_array()) {
        for stream in streams {
            let is_video = stream.get("codec_type").and_then(|c| c.as_str()) == Some("video");
            if !is_video {
                continue;
            }
            if let Some(duration_str) = stream.get("duration").and_then(|d| d.as_str()) {
                if let Ok(duration) = duration_str.parse::<f64>() {
                    return Ok(duration.round() as i32);
                }
            }
        }
    }

    Err("Could not extract duration from video metadata".into())
}
