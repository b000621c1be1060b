use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::downloader::manager::DownloadManager;
use crate::downloader::queue::{QueueSnapshot, RequestOutcome};
use crate::downloader::{DownloadStatus, Format, Quality};
use crate::errors::{AppError, Result};
use crate::metadata::{FetchInput, MetadataSource};
use crate::security::InputValidator;

// State management
pub struct AppState {
    pub config: Arc<Mutex<AppConfig>>,
    pub download_manager: Arc<DownloadManager>,
    pub metadata_source: Arc<dyn MetadataSource>,
    pub validator: InputValidator,
}

impl AppState {
    pub fn new(config: AppConfig, metadata_source: Arc<dyn MetadataSource>) -> Self {
        let download_manager = Arc::new(DownloadManager::from_config(&config));
        Self {
            config: Arc::new(Mutex::new(config)),
            download_manager,
            metadata_source,
            validator: InputValidator::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub download_dir: Option<String>,
    pub browser: Option<String>,
    pub subtitle_langs: Option<Vec<String>>,
}

async fn fetch(state: &AppState, input: FetchInput) -> Result<serde_json::Value> {
    state.validator.validate_batch(&input.urls())?;

    let count = state
        .download_manager
        .load(state.metadata_source.as_ref(), &input)
        .await
        .map_err(|e| {
            log::error!("Failed to fetch video metadata: {}", e);
            e
        })?;

    Ok(serde_json::json!({
        "success": true,
        "fetched_count": count
    }))
}

pub async fn fetch_videos(state: &AppState, url: String) -> Result<serde_json::Value> {
    fetch(state, FetchInput::Single(url.trim().to_string())).await
}

/// Fetches every non-blank line of a batch file's contents.
pub async fn fetch_batch(state: &AppState, contents: &str) -> Result<serde_json::Value> {
    fetch(state, FetchInput::from_batch_text(contents)).await
}

pub async fn get_download_queue(state: &AppState) -> Result<QueueSnapshot> {
    Ok(state.download_manager.snapshot().await)
}

pub async fn download_single(state: &AppState, item_id: String) -> Result<serde_json::Value> {
    match state.download_manager.request_download(&item_id).await {
        RequestOutcome::Started { id, command } => Ok(serde_json::json!({
            "success": true,
            "item_id": id,
            "started": true,
            "command": command
        })),
        RequestOutcome::Queued { id, position } => Ok(serde_json::json!({
            "success": true,
            "item_id": id,
            "started": false,
            "queue_position": position
        })),
        RequestOutcome::Rejected { id, reason } => Ok(serde_json::json!({
            "success": false,
            "item_id": id,
            "reason": reason
        })),
    }
}

pub async fn download_all_pending(state: &AppState) -> Result<serde_json::Value> {
    let outcome = state.download_manager.download_all().await;
    Ok(serde_json::json!({
        "success": true,
        "started": outcome.started,
        "queued": outcome.queued,
        "queued_count": outcome.queued.len()
    }))
}

pub async fn stop_queue(state: &AppState) -> Result<serde_json::Value> {
    let cleared = state.download_manager.stop_queue().await;
    Ok(serde_json::json!({
        "success": true,
        "cleared_count": cleared,
        "active": state.download_manager.active_id().await
    }))
}

pub async fn toggle_pause(state: &AppState, item_id: String) -> Result<serde_json::Value> {
    let status = state.download_manager.toggle_pause(&item_id).await;
    Ok(serde_json::json!({
        "success": status.is_some(),
        "item_id": item_id,
        "status": status.map(|s| s.as_str())
    }))
}

/// Retrying is a plain download request for an item in the error state.
pub async fn retry_download(state: &AppState, item_id: String) -> Result<serde_json::Value> {
    let item = state
        .download_manager
        .get_item(&item_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))?;

    if item.status != DownloadStatus::Error {
        return Err(AppError::InvalidInput(format!(
            "Item {} is {}, only failed items can be retried",
            item_id, item.status
        )));
    }

    download_single(state, item_id).await
}

pub async fn update_format(state: &AppState, item_id: String, format: String) -> Result<serde_json::Value> {
    let format: Format = format.parse()?;
    let applied = state.download_manager.update_format(&item_id, format).await;
    Ok(serde_json::json!({
        "success": applied,
        "item_id": item_id,
        "format": format.extension()
    }))
}

pub async fn update_quality(state: &AppState, item_id: String, quality: String) -> Result<serde_json::Value> {
    let quality: Quality = quality.parse()?;
    let applied = state.download_manager.update_quality(&item_id, quality).await;
    Ok(serde_json::json!({
        "success": applied,
        "item_id": item_id,
        "quality": quality.label()
    }))
}

pub async fn get_command(state: &AppState, item_id: String) -> Result<String> {
    state
        .download_manager
        .command_for(&item_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))
}

pub async fn get_settings(state: &AppState) -> Result<serde_json::Value> {
    let settings = state.download_manager.settings().await;
    Ok(serde_json::to_value(settings)?)
}

pub async fn update_settings(state: &AppState, update: SettingsUpdate) -> Result<serde_json::Value> {
    let mut config = state.config.lock().await;

    if let Some(dir) = update.download_dir {
        state.validator.validate_download_path(&dir)?;
        config.download_path = dir.clone().into();
        state.download_manager.set_download_dir(dir).await;
    }

    if let Some(browser) = update.browser {
        state.validator.validate_browser(&browser)?;
        config.browser = browser.to_lowercase();
        state.download_manager.set_browser(browser.to_lowercase()).await;
    }

    if let Some(langs) = update.subtitle_langs {
        config.subtitle_langs = langs.clone();
        state.download_manager.set_subtitle_langs(langs).await;
    }

    drop(config);
    get_settings(state).await
}

pub async fn load_cookies_from_file(state: &AppState, file_name: String) -> Result<serde_json::Value> {
    state.download_manager.load_cookies_from_file(&file_name).await;
    Ok(serde_json::json!({ "success": true, "cookies_loaded": true }))
}

pub async fn load_cookies_from_browser(state: &AppState) -> Result<serde_json::Value> {
    state.download_manager.load_cookies_from_browser().await;
    Ok(serde_json::json!({ "success": true, "cookies_loaded": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::providers::MockYoutubeProvider;
    use std::time::Duration;

    fn state() -> AppState {
        let mut config = AppConfig::default();
        config.queue.seed = Some(1);
        AppState::new(
            config,
            Arc::new(MockYoutubeProvider::new().with_latency(Duration::from_millis(10))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_then_download_all() {
        let state = state();
        let result = fetch_videos(&state, "https://www.youtube.com/playlist?list=PL1".to_string())
            .await
            .unwrap();
        assert_eq!(result["fetched_count"], 6);

        let result = download_all_pending(&state).await.unwrap();
        assert_eq!(result["queued_count"], 5);
        assert!(state.download_manager.is_queue_running().await);

        let result = stop_queue(&state).await.unwrap();
        assert_eq!(result["cleared_count"], 5);
        assert!(result["active"].is_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_url_is_rejected_before_fetch() {
        let state = state();
        let result = fetch_batch(&state, "https://youtu.be/a\nhttps://example.com/x\n").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(get_download_queue(&state).await.unwrap().items.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_and_retry_flow() {
        let state = state();
        fetch_videos(&state, "https://youtu.be/abc".to_string()).await.unwrap();
        let id = get_download_queue(&state).await.unwrap().items[0].id.clone();

        let result = update_format(&state, id.clone(), "mp3".to_string()).await.unwrap();
        assert_eq!(result["success"], true);
        let result = update_quality(&state, id.clone(), "320k".to_string()).await.unwrap();
        assert_eq!(result["success"], true);
        assert!(get_command(&state, id.clone()).await.unwrap().contains("--audio-quality 320k"));

        assert!(retry_download(&state, id.clone()).await.is_err());
        let result = download_single(&state, id.clone()).await.unwrap();
        assert_eq!(result["started"], true);

        let result = update_quality(&state, id.clone(), "128k".to_string()).await.unwrap();
        assert_eq!(result["success"], false);

        state.download_manager.mark_failed(&id, "extractor crashed").await;
        let result = retry_download(&state, id).await.unwrap();
        assert_eq!(result["started"], true);
    }

    #[tokio::test]
    async fn test_settings_update() {
        let state = state();
        load_cookies_from_browser(&state).await.unwrap();
        let settings = update_settings(
            &state,
            SettingsUpdate {
                download_dir: Some("/srv/media".to_string()),
                browser: Some("Firefox".to_string()),
                subtitle_langs: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(settings["download_dir"], "/srv/media");
        assert_eq!(settings["browser"], "firefox");
        assert_eq!(settings["cookies_loaded"], true);
        assert!(update_settings(
            &state,
            SettingsUpdate { browser: Some("lynx".to_string()), ..Default::default() }
        )
        .await
        .is_err());
    }
}
