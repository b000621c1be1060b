//! Download queue for YouTube videos and playlists.
//!
//! Items come from a [`metadata::MetadataSource`], are edited per item
//! (format and quality) and are then downloaded one at a time through a single
//! active slot with a FIFO queue behind it. Transfers are simulated by a
//! progress ticker; every started item logs the `yt-dlp` invocation it stands for.

pub mod commands;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod metadata;
pub mod security;
pub mod utils;

pub use config::AppConfig;
pub use downloader::manager::DownloadManager;
pub use downloader::{DownloadSettings, DownloadStatus, Format, Quality, QueueEvent, VideoItem};
pub use errors::{AppError, Result};
