pub mod command;
pub mod manager;
pub mod queue;
pub mod simulator;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::errors::AppError;

/// Speed reading shown for anything that is not actively transferring.
pub const IDLE_SPEED: &str = "0 MB/s";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Idle,
    Downloading,
    Paused,
    Finished,
    Error,
}

impl DownloadStatus {
    /// Statuses from which a download may be (re)started and edits applied.
    pub fn is_startable(&self) -> bool {
        matches!(self, DownloadStatus::Idle | DownloadStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Idle => "idle",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Finished => "finished",
            DownloadStatus::Error => "error",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Mp4,
    Mp3,
}

impl Format {
    pub fn is_audio(&self) -> bool {
        matches!(self, Format::Mp3)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Mp4 => "mp4",
            Format::Mp3 => "mp3",
        }
    }

    /// Quality an item falls back to when its format changes.
    pub fn default_quality(&self) -> Quality {
        match self {
            Format::Mp4 => Quality::P720,
            Format::Mp3 => Quality::K192,
        }
    }

    pub fn qualities(&self) -> &'static [Quality] {
        match self {
            Format::Mp4 => &[Quality::P480, Quality::P720, Quality::P1080],
            Format::Mp3 => &[Quality::K128, Quality::K192, Quality::K256, Quality::K320],
        }
    }

    pub fn accepts(&self, quality: Quality) -> bool {
        quality.is_audio() == self.is_audio()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Ok(Format::Mp4),
            "mp3" => Ok(Format::Mp3),
            other => Err(AppError::InvalidInput(format!(
                "Unknown format: {}. Valid formats: mp4, mp3",
                other
            ))),
        }
    }
}

/// Output quality. Video qualities are resolution labels, audio qualities are bitrates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Quality {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "128k")]
    K128,
    #[serde(rename = "192k")]
    K192,
    #[serde(rename = "256k")]
    K256,
    #[serde(rename = "320k")]
    K320,
}

impl Quality {
    pub fn label(&self) -> &'static str {
        match self {
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::K128 => "128k",
            Quality::K192 => "192k",
            Quality::K256 => "256k",
            Quality::K320 => "320k",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Quality::K128 | Quality::K192 | Quality::K256 | Quality::K320)
    }

    /// Frame height for video qualities.
    pub fn height(&self) -> Option<u32> {
        match self {
            Quality::P480 => Some(480),
            Quality::P720 => Some(720),
            Quality::P1080 => Some(1080),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        [
            Quality::P480,
            Quality::P720,
            Quality::P1080,
            Quality::K128,
            Quality::K192,
            Quality::K256,
            Quality::K320,
        ]
        .into_iter()
        .find(|q| q.label() == wanted)
        .ok_or_else(|| AppError::InvalidInput(format!(
            "Unknown quality: {}. Valid qualities: 480p, 720p, 1080p, 128k, 192k, 256k, 320k",
            s
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoItem {
    pub id: String,
    pub video_id: String,
    pub title: String,
    pub uploader: String,
    pub thumbnail: String,
    pub duration: String,
    pub upload_date: String,
    pub status: DownloadStatus,
    pub progress: f64,
    pub speed: String,
    pub format: Format,
    pub quality: Quality,
    pub error: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl VideoItem {
    pub fn new(video_id: impl Into<String>, title: impl Into<String>, uploader: impl Into<String>) -> Self {
        let video_id = video_id.into();
        Self {
            id: video_id.clone(),
            video_id,
            title: title.into(),
            uploader: uploader.into(),
            thumbnail: String::new(),
            duration: String::new(),
            upload_date: String::new(),
            status: DownloadStatus::Idle,
            progress: 0.0,
            speed: IDLE_SPEED.to_string(),
            format: Format::Mp4,
            quality: Quality::P720,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_quality(mut self, format: Format, quality: Quality) -> Self {
        self.format = format;
        self.quality = if format.accepts(quality) { quality } else { format.default_quality() };
        self
    }

    /// Canonical watch URL of the underlying video.
    pub fn watch_url(&self) -> String {
        format!(
            "https://www.youtube.com/watch?v={}",
            urlencoding::encode(&self.video_id)
        )
    }
}

/// Global settings the command formatter renders against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadSettings {
    pub download_dir: String,
    pub cookies_loaded: bool,
    pub browser: String,
    pub subtitle_langs: Vec<String>,
    pub merge_format: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            download_dir: "/home/user/Downloads/YouTube Downloader".to_string(),
            cookies_loaded: false,
            browser: "chrome".to_string(),
            subtitle_langs: vec!["en".to_string()],
            merge_format: "mp4".to_string(),
        }
    }
}

/// State changes published by the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    Started { id: String, command: String },
    Queued { id: String, position: usize },
    Progress { id: String, progress: f64, speed: String },
    Paused { id: String },
    Resumed { id: String },
    Finished { id: String },
    Failed { id: String, reason: String },
    QueueStopped { cleared: usize },
    /// The active slot emptied with nothing left to start.
    Idle,
}
