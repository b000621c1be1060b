use std::time::Duration;
use rand::distributions::Alphanumeric;
use rand::Rng;
use url::Url;
use crate::config::MetadataConfig;
use crate::downloader::{Format, Quality, VideoItem};
use crate::errors::Result;
use crate::metadata::MetadataSource;

const THUMBNAIL_BASE: &str = "https://picsum.photos/160/90?random=";

/// Stand-in for a yt-dlp info extraction: canned records after a fake delay.
#[derive(Debug, Clone)]
pub struct MockYoutubeProvider {
    latency: Duration,
    playlist_size: usize,
}

impl MockYoutubeProvider {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(1500),
            playlist_size: 6,
        }
    }

    pub fn from_config(config: &MetadataConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.latency_ms),
            playlist_size: config.playlist_size.max(1),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn random_token() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect()
    }

    fn playlist_items(&self) -> Vec<VideoItem> {
        (0..self.playlist_size)
            .map(|i| {
                let mut item = VideoItem::new(
                    format!("pl-vid-{}-{}", i, Self::random_token()),
                    format!("Awesome Playlist Track {} - Full Version", i + 1),
                    "Music Channel Official",
                )
                .with_quality(Format::Mp4, Quality::P720);
                item.thumbnail = format!("{}{}", THUMBNAIL_BASE, i + 20);
                item.duration = "3:45".to_string();
                item.upload_date = "20240301".to_string();
                item
            })
            .collect()
    }

    fn single_item(&self) -> VideoItem {
        let mut item = VideoItem::new(
            format!("vid-{}", Self::random_token()),
            "Understanding React Hooks in 2024 - Complete Guide",
            "Tech Educator",
        )
        .with_quality(Format::Mp4, Quality::P1080);
        item.thumbnail = format!("{}{}", THUMBNAIL_BASE, 100);
        item.duration = "12:30".to_string();
        item.upload_date = "20240115".to_string();
        item
    }
}

impl Default for MockYoutubeProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Playlist links carry a `list` parameter (`watch?v=..&list=..`) or a `/playlist` path.
pub fn is_playlist_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.query_pairs().any(|(key, _)| key == "list") || parsed.path().contains("/playlist")
        }
        Err(_) => url.contains("list=") || url.contains("/playlist"),
    }
}

#[async_trait::async_trait]
impl MetadataSource for MockYoutubeProvider {
    async fn fetch(&self, url: &str) -> Result<Vec<VideoItem>> {
        log::debug!("[FETCH] Simulating extraction of {} ({:?})", url, self.latency);
        tokio::time::sleep(self.latency).await;

        if is_playlist_url(url) {
            Ok(self.playlist_items())
        } else {
            Ok(vec![self.single_item()])
        }
    }

    fn name(&self) -> &str {
        "mock-youtube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::DownloadStatus;

    #[test]
    fn test_playlist_detection() {
        assert!(is_playlist_url("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_playlist_url("https://www.youtube.com/watch?v=abc&list=PL123"));
        assert!(!is_playlist_url("https://www.youtube.com/watch?v=abc"));
        assert!(!is_playlist_url("https://youtu.be/abc"));
        assert!(is_playlist_url("youtube.com/watch?v=abc&list=PL1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playlist_fetch_returns_fixed_batch() {
        let provider = MockYoutubeProvider::new();
        let items = provider.fetch("https://www.youtube.com/playlist?list=PL1").await.unwrap();

        assert_eq!(items.len(), 6);
        for (i, item) in items.iter().enumerate() {
            assert!(item.id.starts_with(&format!("pl-vid-{}-", i)));
            assert_eq!(item.title, format!("Awesome Playlist Track {} - Full Version", i + 1));
            assert_eq!(item.thumbnail, format!("https://picsum.photos/160/90?random={}", i + 20));
            assert_eq!(item.status, DownloadStatus::Idle);
            assert_eq!(item.progress, 0.0);
            assert_eq!((item.format, item.quality), (Format::Mp4, Quality::P720));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_fetch_is_stable_apart_from_id() {
        let provider = MockYoutubeProvider::new();
        let first = provider.fetch("https://www.youtube.com/watch?v=abc").await.unwrap();
        let second = provider.fetch("https://www.youtube.com/watch?v=abc").await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, second[0].title);
        assert_eq!(first[0].thumbnail, "https://picsum.photos/160/90?random=100");
        assert_eq!(first[0].quality, Quality::P1080);
        assert!(first[0].id.starts_with("vid-"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_waits_for_latency() {
        let provider = MockYoutubeProvider::new().with_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        provider.fetch("https://youtu.be/abc").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
