//! End-to-end queue tests: metadata fetch, download_all, the progress ticker
//! and the completion hand-off, all on tokio's paused clock.

use std::time::Duration;

use yt_queue::config::AppConfig;
use yt_queue::downloader::queue::RequestOutcome;
use yt_queue::metadata::providers::MockYoutubeProvider;
use yt_queue::metadata::{FetchInput, MetadataSource};
use yt_queue::{AppError, DownloadManager, DownloadStatus, QueueEvent, VideoItem};

/// Returns one item per URL after `delay`, failing for URLs containing `fail_on`.
struct ScriptedSource {
    delay: Duration,
    fail_on: Option<&'static str>,
}

#[async_trait::async_trait]
impl MetadataSource for ScriptedSource {
    async fn fetch(&self, url: &str) -> yt_queue::Result<Vec<VideoItem>> {
        tokio::time::sleep(self.delay).await;
        if let Some(marker) = self.fail_on {
            if url.contains(marker) {
                return Err(AppError::Metadata(format!("extraction failed for {}", url)));
            }
        }
        let video_id = url.rsplit('=').next().unwrap_or(url);
        Ok(vec![VideoItem::new(video_id, format!("Video {}", video_id), "Scripted")])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.queue.seed = Some(42);
    config.queue.min_increment = 50.0;
    config.queue.max_increment = 50.0;
    config.metadata.latency_ms = 10;
    config
}

// =============================================================================
// Full playlist run
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_playlist_downloads_one_at_a_time_until_idle() {
    let config = fast_config();
    let manager = DownloadManager::from_config(&config);
    let provider = MockYoutubeProvider::from_config(&config.metadata);

    let input = FetchInput::Single("https://www.youtube.com/playlist?list=PL42".to_string());
    assert_eq!(manager.load(&provider, &input).await.unwrap(), 6);

    let mut events = manager.subscribe();
    let outcome = manager.download_all().await;
    assert!(outcome.started.is_some());
    assert_eq!(outcome.queued.len(), 5);

    manager.wait_idle().await;

    let items = manager.get_all_items().await;
    assert!(items.iter().all(|item| item.status == DownloadStatus::Finished));
    assert!(items.iter().all(|item| item.progress == 100.0));
    assert!(!manager.is_ticking().await);

    let mut started = Vec::new();
    let mut finished = Vec::new();
    let mut saw_idle = false;
    while let Ok(event) = events.try_recv() {
        match event {
            QueueEvent::Started { id, command } => {
                assert!(command.starts_with("yt-dlp "));
                started.push(id);
            }
            QueueEvent::Finished { id } => {
                // Nothing starts before the previous item finished.
                assert_eq!(started.len(), finished.len() + 1);
                finished.push(id);
            }
            QueueEvent::Idle => saw_idle = true,
            _ => {}
        }
    }

    let fetched_order: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
    assert_eq!(started, fetched_order);
    assert_eq!(finished, fetched_order);
    assert!(saw_idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_queue_right_after_download_all_finishes_only_the_first() {
    let config = fast_config();
    let manager = DownloadManager::from_config(&config);
    let provider = MockYoutubeProvider::from_config(&config.metadata);
    let input = FetchInput::Single("https://www.youtube.com/watch?v=abc&list=PL1".to_string());
    manager.load(&provider, &input).await.unwrap();

    let first = manager.download_all().await.started.unwrap();
    assert_eq!(manager.stop_queue().await, 5);
    manager.wait_idle().await;

    for item in manager.get_all_items().await {
        let expected = if item.id == first { DownloadStatus::Finished } else { DownloadStatus::Idle };
        assert_eq!(item.status, expected, "item {}", item.id);
    }

    // The queue can be started again afterwards.
    assert!(matches!(
        manager.download_all().await.started,
        Some(ref id) if id != &first
    ));
}

// =============================================================================
// Fetch failures and staleness
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_failing_batch_line_leaves_store_empty() {
    let manager = DownloadManager::from_config(&fast_config());
    let good = ScriptedSource { delay: Duration::from_millis(10), fail_on: None };
    manager
        .load(&good, &FetchInput::Single("https://youtu.be/watch?v=first".to_string()))
        .await
        .unwrap();
    assert_eq!(manager.get_all_items().await.len(), 1);

    let flaky = ScriptedSource { delay: Duration::from_millis(10), fail_on: Some("broken") };
    let batch = FetchInput::from_batch_text(
        "https://www.youtube.com/watch?v=one\n\nhttps://www.youtube.com/watch?v=broken\nhttps://www.youtube.com/watch?v=three\n",
    );
    let result = manager.load(&flaky, &batch).await;

    assert!(matches!(result, Err(AppError::Metadata(_))));
    assert!(manager.get_all_items().await.is_empty());
    assert!(manager.is_idle().await);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_is_a_fetch_failure() {
    let manager = DownloadManager::from_config(&fast_config()).with_fetch_timeout(Duration::from_secs(1));
    let hanging = ScriptedSource { delay: Duration::from_secs(3600), fail_on: None };

    let result = manager
        .load(&hanging, &FetchInput::Single("https://youtu.be/watch?v=slow".to_string()))
        .await;

    assert!(matches!(result, Err(AppError::Timeout(_))));
    assert!(manager.get_all_items().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_newer_fetch_wins_over_a_slower_older_one() {
    let manager = DownloadManager::from_config(&fast_config());
    let slow = ScriptedSource { delay: Duration::from_secs(5), fail_on: None };
    let fast = ScriptedSource { delay: Duration::from_millis(10), fail_on: None };

    let old_input = FetchInput::Single("https://www.youtube.com/watch?v=old".to_string());
    let new_input = FetchInput::Single("https://www.youtube.com/watch?v=new".to_string());
    let (old, new) = tokio::join!(
        manager.load(&slow, &old_input),
        manager.load(&fast, &new_input),
    );

    assert_eq!(old.unwrap(), 0);
    assert_eq!(new.unwrap(), 1);
    let items = manager.get_all_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].video_id, "new");
}

#[tokio::test(start_paused = true)]
async fn test_refetch_mid_download_stops_the_ticker() {
    let manager = DownloadManager::from_config(&fast_config());
    let source = ScriptedSource { delay: Duration::from_millis(10), fail_on: None };
    manager
        .load(&source, &FetchInput::Single("https://www.youtube.com/watch?v=a".to_string()))
        .await
        .unwrap();

    let outcome = manager.request_download("a").await;
    assert!(matches!(outcome, RequestOutcome::Started { .. }));
    assert!(manager.is_ticking().await);

    manager
        .load(&source, &FetchInput::Single("https://www.youtube.com/watch?v=b".to_string()))
        .await
        .unwrap();

    assert!(!manager.is_ticking().await);
    assert_eq!(manager.active_id().await, None);
    assert_eq!(manager.get_item("b").await.unwrap().status, DownloadStatus::Idle);
}
