pub mod providers;

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::downloader::VideoItem;
use crate::errors::{AppError, Result};
use crate::utils::{generate_freshness_token, non_blank_lines};

/// Something that turns a URL into download items.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<VideoItem>>;
    fn name(&self) -> &str;
}

/// What the user submitted: one URL, or the lines of a batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FetchInput {
    Single(String),
    Batch(Vec<String>),
}

impl FetchInput {
    pub fn from_batch_text(text: &str) -> Self {
        FetchInput::Batch(non_blank_lines(text))
    }

    pub fn urls(&self) -> Vec<&str> {
        match self {
            FetchInput::Single(url) => vec![url.as_str()],
            FetchInput::Batch(lines) => lines
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .collect(),
        }
    }
}

async fn fetch_one(source: &dyn MetadataSource, url: &str, timeout: Duration) -> Result<Vec<VideoItem>> {
    tokio::time::timeout(timeout, source.fetch(url))
        .await
        .map_err(|_| AppError::Timeout(format!("metadata fetch for {} after {:?}", url, timeout)))?
}

/// Resolves every URL of `input` through `source`.
///
/// Batch results are concatenated in line order and every id gets a fresh
/// suffix so repeated videos never collide. Any failure aborts the whole batch.
pub async fn fetch_items(source: &dyn MetadataSource, input: &FetchInput, timeout: Duration) -> Result<Vec<VideoItem>> {
    match input {
        FetchInput::Single(url) => {
            log::info!("🔍 [FETCH] Fetching {} via {}", url, source.name());
            let items = fetch_one(source, url, timeout).await?;
            log::info!("✅ [FETCH] {} items from {}", items.len(), url);
            Ok(items)
        }
        FetchInput::Batch(_) => {
            let urls = input.urls();
            log::info!("🔍 [FETCH] Fetching batch of {} urls via {}", urls.len(), source.name());

            let mut all = Vec::new();
            for url in urls {
                let items = fetch_one(source, url, timeout).await.map_err(|e| {
                    log::error!("❌ [FETCH] Batch aborted at {}: {}", url, e);
                    e
                })?;
                all.extend(items.into_iter().map(|mut item| {
                    item.id = format!("{}-{}", item.id, generate_freshness_token());
                    item
                }));
            }

            log::info!("✅ [FETCH] Batch produced {} items", all.len());
            Ok(all)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Always returns the same single item.
    struct FixedSource;

    #[async_trait::async_trait]
    impl MetadataSource for FixedSource {
        async fn fetch(&self, url: &str) -> Result<Vec<VideoItem>> {
            if url.contains("broken") {
                return Err(AppError::Metadata("extractor failed".to_string()));
            }
            Ok(vec![VideoItem::new("same", "Same video", "Someone")])
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct HangingSource;

    #[async_trait::async_trait]
    impl MetadataSource for HangingSource {
        async fn fetch(&self, _url: &str) -> Result<Vec<VideoItem>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test]
    async fn test_batch_ids_are_unique() {
        let input = FetchInput::from_batch_text("https://youtu.be/a\n\nhttps://youtu.be/a\n  \nhttps://youtu.be/a\n");
        let items = fetch_items(&FixedSource, &input, Duration::from_secs(5)).await.unwrap();

        assert_eq!(items.len(), 3);
        let ids: HashSet<_> = items.iter().map(|item| item.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(items.iter().all(|item| item.id.starts_with("same-") && item.video_id == "same"));
    }

    #[tokio::test]
    async fn test_single_fetch_keeps_ids() {
        let input = FetchInput::Single("https://youtu.be/a".to_string());
        let items = fetch_items(&FixedSource, &input, Duration::from_secs(5)).await.unwrap();
        assert_eq!(items[0].id, "same");
    }

    #[tokio::test]
    async fn test_failing_line_aborts_batch() {
        let input = FetchInput::from_batch_text("https://youtu.be/a\nhttps://youtu.be/broken\nhttps://youtu.be/c");
        let result = fetch_items(&FixedSource, &input, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(AppError::Metadata(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_times_out() {
        let input = FetchInput::Single("https://youtu.be/a".to_string());
        let result = fetch_items(&HangingSource, &input, Duration::from_secs(30)).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[test]
    fn test_blank_batch_has_no_urls() {
        assert!(FetchInput::from_batch_text("\n   \n").urls().is_empty());
    }
}
