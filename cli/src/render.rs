//! Terminal output. Results go to stdout, notifications to stderr.

use std::io::Write;
use std::path::Path;

use api::units::{format_bytes, format_duration};
use api::{DownloadProgress, DownloadStatus, DownloadedVideo, VideoFormat, VideoInfo};
use client::monitor::{MonitorUpdate, UpdateKind};

pub fn progress_line(progress: &DownloadProgress) -> String {
    let mut parts = Vec::new();
    if !progress.title.is_empty() {
        parts.push(progress.title.clone());
    }
    parts.push(match progress.status {
        DownloadStatus::Downloading => format!("{:.1}%", progress.progress),
        DownloadStatus::Starting => "starting".to_owned(),
        DownloadStatus::Finished => "finished".to_owned(),
        DownloadStatus::Error => "failed".to_owned(),
        DownloadStatus::Idle | DownloadStatus::Unknown => "waiting".to_owned(),
    });
    if progress.total > 0 {
        parts.push(format!(
            "{} of {}",
            format_bytes(progress.downloaded),
            format_bytes(progress.total)
        ));
    }
    if !progress.speed.is_empty() {
        parts.push(progress.speed.clone());
    }
    if !progress.eta.is_empty() {
        parts.push(format!("ETA {}", progress.eta));
    }
    parts.join(" | ")
}

pub fn format_row(format: &VideoFormat) -> String {
    let size = match format.filesize_approx {
        0 => "-".to_owned(),
        bytes => format_bytes(bytes),
    };
    let resolution = match format.resolution.as_str() {
        "" => "audio only",
        resolution => resolution,
    };
    let mut row = format!("{:>8}  {:<12} {:>12}", format.format_id, resolution, size);
    if !format.vcodec.is_empty() {
        row.push_str(&format!("  {}", format.vcodec));
    }
    if format.fps > 0.0 {
        row.push_str(&format!("  {}fps", format.fps));
    }
    row
}

/// Terminal text for a monitor update. Failures have none, they reach the
/// user as the command's error.
pub fn update_text(update: &MonitorUpdate) -> Option<String> {
    match &update.kind {
        UpdateKind::Progress(progress) => Some(format!("\r\x1b[2K{}", progress_line(progress))),
        UpdateKind::Finished => Some("\r\x1b[2KDownload complete\n".to_owned()),
        UpdateKind::Stopped => Some("\n".to_owned()),
        UpdateKind::Started | UpdateKind::Failed(_) => None,
    }
}

pub fn update(update: &MonitorUpdate) {
    match &update.kind {
        UpdateKind::Started => log::debug!("Watching download, session {}", update.session),
        UpdateKind::Failed(message) => {
            log::warn!("Poll session {} failed: {}", update.session, message)
        }
        _ => {}
    }
    if let Some(text) = update_text(update) {
        let mut stdout = std::io::stdout();
        // progress redraws in place
        let _ = write!(stdout, "{}", text);
        let _ = stdout.flush();
    }
}

pub fn video_info(info: &VideoInfo) {
    println!("{}", info.title);
    println!("Duration: {}", format_duration(info.duration));
    if let Some(thumbnail) = &info.thumbnail {
        println!("Thumbnail: {}", thumbnail);
    }
    if info.formats.is_empty() {
        return;
    }
    println!("Formats:");
    for format in &info.formats {
        println!("{}", format_row(format));
    }
}

pub fn downloaded(video: &DownloadedVideo) {
    match &video.title {
        Some(title) => println!(
            "Downloaded {} ({})",
            title,
            format_duration(video.duration)
        ),
        None => println!("Downloaded {}", video.download_path),
    }
}

pub fn message(message: &str) {
    println!("{}", message);
}

pub fn saved(path: &Path, size: u64) {
    println!("Saved {} ({})", path.to_string_lossy(), format_bytes(size));
}

pub fn failure(error: &anyhow::Error) {
    eprintln!("Error: {:#}", error);
}
